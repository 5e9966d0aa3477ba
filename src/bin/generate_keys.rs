use akibeks::auth::jwt::JwtConfig;

fn main() {
    let (private_key, public_key) = JwtConfig::generate_key_pair();

    println!("Signing key for the API server (keep it out of version control):");
    println!("JWT_PRIVATE_KEY={}", private_key);
    println!();
    println!("Verification key for services that only check tokens:");
    println!("{}", public_key);
}

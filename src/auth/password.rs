//! Password hashing with bcrypt.

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    pub fn complex(min_length: usize) -> Self {
        Self {
            min_length,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }

    /// Every rule the password breaks, in a fixed order.
    pub fn violations(&self, password: &str) -> Vec<PasswordPolicyError> {
        let mut errors = Vec::new();

        if password.chars().count() < self.min_length {
            errors.push(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push(PasswordPolicyError::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push(PasswordPolicyError::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(PasswordPolicyError::MissingDigit);
        }
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            errors.push(PasswordPolicyError::MissingSpecial);
        }

        errors
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        match self.violations(password).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min_length} characters")]
    TooShort { min_length: usize },
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one number")]
    MissingDigit,
    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

pub struct PasswordService;

impl PasswordService {
    pub const PRODUCTION_COST: u32 = 12;

    pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
        Self::hash_password_with_cost(password, Self::PRODUCTION_COST)
    }

    /// bcrypt accepts costs 4 through 31; anything else is an error.
    pub fn hash_password_with_cost(
        password: &str,
        cost: u32,
    ) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, cost)
    }

    /// Constant-time comparison. A malformed stored hash is an error, not a mismatch.
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, password_hash)
    }
}

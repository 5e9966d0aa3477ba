// Mirrors the DDL in `migrate.rs`. Keep both in sync when adding columns.

diesel::table! {
    users (id) {
        #[max_length = 36]
        id -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        phone -> Nullable<Varchar>,
        role -> Varchar,
        status -> Varchar,
        email_verified -> Bool,
        verification_token_hash -> Nullable<Varchar>,
        reset_token_hash -> Nullable<Varchar>,
        reset_token_expires_at -> Nullable<Datetime>,
        failed_login_attempts -> Integer,
        locked_until -> Nullable<Datetime>,
        two_factor_secret -> Nullable<Varchar>,
        last_login -> Nullable<Datetime>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    permissions (id) {
        #[max_length = 36]
        id -> Varchar,
        name -> Varchar,
        category -> Varchar,
        description -> Nullable<Varchar>,
        created_at -> Datetime,
    }
}

diesel::table! {
    user_permissions (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 36]
        user_id -> Varchar,
        #[max_length = 36]
        permission_id -> Varchar,
        #[max_length = 36]
        granted_by -> Nullable<Varchar>,
        granted_at -> Datetime,
    }
}

diesel::table! {
    services (id) {
        #[max_length = 36]
        id -> Varchar,
        title -> Varchar,
        slug -> Varchar,
        description -> Text,
        starting_price -> Nullable<Numeric>,
        currency -> Varchar,
        is_active -> Bool,
        sort_order -> Integer,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    projects (id) {
        #[max_length = 36]
        id -> Varchar,
        title -> Varchar,
        slug -> Varchar,
        description -> Nullable<Text>,
        category -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        status -> Varchar,
        budget -> Nullable<Numeric>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        is_featured -> Bool,
        #[max_length = 36]
        created_by -> Nullable<Varchar>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    project_milestones (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 36]
        project_id -> Varchar,
        title -> Varchar,
        due_date -> Nullable<Date>,
        completed -> Bool,
        sort_order -> Integer,
        created_at -> Datetime,
    }
}

diesel::table! {
    quotations (id) {
        #[max_length = 36]
        id -> Varchar,
        quotation_number -> Varchar,
        client_name -> Varchar,
        client_email -> Varchar,
        #[max_length = 36]
        project_id -> Nullable<Varchar>,
        items -> Json,
        subtotal -> Numeric,
        tax_rate -> Numeric,
        tax_amount -> Numeric,
        discount -> Numeric,
        total -> Numeric,
        status -> Varchar,
        valid_until -> Nullable<Date>,
        #[max_length = 36]
        created_by -> Nullable<Varchar>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    invoices (id) {
        #[max_length = 36]
        id -> Varchar,
        invoice_number -> Varchar,
        #[max_length = 36]
        quotation_id -> Nullable<Varchar>,
        client_name -> Varchar,
        client_email -> Varchar,
        items -> Json,
        subtotal -> Numeric,
        tax_rate -> Numeric,
        tax_amount -> Numeric,
        discount -> Numeric,
        total -> Numeric,
        amount_paid -> Numeric,
        balance -> Numeric,
        status -> Varchar,
        due_date -> Nullable<Date>,
        #[max_length = 36]
        created_by -> Nullable<Varchar>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    blog_posts (id) {
        #[max_length = 36]
        id -> Varchar,
        title -> Varchar,
        slug -> Varchar,
        excerpt -> Nullable<Varchar>,
        content -> Text,
        status -> Varchar,
        #[max_length = 36]
        author_id -> Nullable<Varchar>,
        published_at -> Nullable<Datetime>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    contact_submissions (id) {
        #[max_length = 36]
        id -> Varchar,
        submission_type -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        subject -> Nullable<Varchar>,
        message -> Nullable<Text>,
        details -> Nullable<Json>,
        status -> Varchar,
        responded_at -> Nullable<Datetime>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    settings (id) {
        #[max_length = 36]
        id -> Varchar,
        setting_key -> Varchar,
        setting_value -> Text,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    system_logs (id) {
        #[max_length = 36]
        id -> Varchar,
        level -> Varchar,
        message -> Text,
        context -> Nullable<Json>,
        created_at -> Datetime,
    }
}

diesel::table! {
    audit_logs (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 36]
        user_id -> Nullable<Varchar>,
        action -> Varchar,
        resource_type -> Varchar,
        resource_id -> Nullable<Varchar>,
        details -> Nullable<Json>,
        ip_address -> Nullable<Varchar>,
        created_at -> Datetime,
    }
}

diesel::table! {
    files (id) {
        #[max_length = 36]
        id -> Varchar,
        original_name -> Varchar,
        stored_name -> Varchar,
        mime_type -> Varchar,
        size_bytes -> Bigint,
        #[max_length = 36]
        uploaded_by -> Nullable<Varchar>,
        created_at -> Datetime,
    }
}

diesel::table! {
    project_media (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 36]
        project_id -> Varchar,
        #[max_length = 36]
        file_id -> Varchar,
        caption -> Nullable<Varchar>,
        sort_order -> Integer,
        created_at -> Datetime,
    }
}

diesel::table! {
    user_sessions (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 36]
        user_id -> Varchar,
        refresh_token_hash -> Varchar,
        user_agent -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        expires_at -> Datetime,
        created_at -> Datetime,
    }
}

diesel::joinable!(user_permissions -> users (user_id));
diesel::joinable!(user_permissions -> permissions (permission_id));
diesel::joinable!(project_milestones -> projects (project_id));
diesel::joinable!(project_media -> projects (project_id));
diesel::joinable!(project_media -> files (file_id));
diesel::joinable!(user_sessions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    permissions,
    user_permissions,
    services,
    projects,
    project_milestones,
    quotations,
    invoices,
    blog_posts,
    contact_submissions,
    settings,
    system_logs,
    audit_logs,
    files,
    project_media,
    user_sessions,
);

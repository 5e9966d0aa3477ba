use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use diesel::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Current UTC time truncated to whole seconds, matching `DATETIME` precision.
pub fn now() -> NaiveDateTime {
    let t = Utc::now().naive_utc();
    t.with_nanosecond(0).unwrap_or(t)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a string-backed enum stored in a `VARCHAR` column.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            Serialize, Deserialize, ToSchema,
            diesel::AsExpression, diesel::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $text $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::mysql::Mysql> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::mysql::Mysql>,
            ) -> diesel::serialize::Result {
                <str as diesel::serialize::ToSql<diesel::sql_types::Text, diesel::mysql::Mysql>>::to_sql(
                    self.as_str(),
                    out,
                )
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::mysql::Mysql> for $name {
            fn from_sql(bytes: diesel::mysql::MysqlValue<'_>) -> diesel::deserialize::Result<Self> {
                let raw = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::mysql::Mysql,
                >>::from_sql(bytes)?;
                Ok(raw.parse()?)
            }
        }
    };
}

text_enum! {
    Role {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    UserStatus {
        Active => "active",
        Pending => "pending",
        Suspended => "suspended",
    }
}

text_enum! {
    ProjectStatus {
        Planning => "planning",
        InProgress => "in_progress" | "ongoing",
        OnHold => "on_hold",
        Completed => "completed",
    }
}

text_enum! {
    SubmissionStatus {
        New => "new",
        Contacted => "contacted",
        Responded => "responded",
        Closed => "closed",
    }
}

text_enum! {
    SubmissionType {
        Quote => "quote",
        Application => "application",
        Contact => "contact",
    }
}

text_enum! {
    BlogStatus {
        Draft => "draft",
        Published => "published",
    }
}

text_enum! {
    QuotationStatus {
        Draft => "draft",
        Sent => "sent",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

text_enum! {
    InvoiceStatus {
        Draft => "draft",
        Sent => "sent",
        Paid => "paid",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
}

impl UserStatus {
    /// Suspended accounts only come back through an administrator.
    pub fn can_transition(from: UserStatus, to: UserStatus, by_admin: bool) -> bool {
        use UserStatus::*;
        match (from, to) {
            (Pending, Active) | (Pending, Suspended) | (Active, Suspended) => true,
            (Suspended, Active) => by_admin,
            _ => false,
        }
    }
}

impl ProjectStatus {
    fn rank(self) -> u8 {
        match self {
            ProjectStatus::Planning => 0,
            ProjectStatus::InProgress | ProjectStatus::OnHold => 1,
            ProjectStatus::Completed => 2,
        }
    }

    pub fn can_transition(from: ProjectStatus, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!((from, to), (InProgress, OnHold) | (OnHold, InProgress)) || to.rank() > from.rank()
    }
}

impl SubmissionStatus {
    fn rank(self) -> u8 {
        match self {
            SubmissionStatus::New => 0,
            SubmissionStatus::Contacted | SubmissionStatus::Responded => 1,
            SubmissionStatus::Closed => 2,
        }
    }

    pub fn can_transition(from: SubmissionStatus, to: SubmissionStatus) -> bool {
        to.rank() > from.rank()
    }

    /// Whether moving into this status marks the first response to the client.
    pub fn is_response(self) -> bool {
        matches!(self, SubmissionStatus::Contacted | SubmissionStatus::Responded)
    }
}

// ============================================================================
// Users and access
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[schema(example = "jane@akibeks.co.ke")]
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub email_verified: bool,
    #[serde(skip)]
    pub verification_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<NaiveDateTime>,
    #[serde(skip)]
    pub failed_login_attempts: i32,
    #[serde(skip)]
    pub locked_until: Option<NaiveDateTime>,
    #[serde(skip)]
    pub two_factor_secret: Option<String>,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// A fresh self-registered account: pending, unverified, role `user`.
    pub fn new(email: String, password_hash: String, first_name: String, last_name: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            email,
            password_hash,
            first_name,
            last_name,
            phone: None,
            role: Role::User,
            status: UserStatus::Pending,
            email_verified: false,
            verification_token_hash: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            failed_login_attempts: 0,
            locked_until: None,
            two_factor_secret: None,
            last_login: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns the lock expiry while the account is still locked at `at`.
    pub fn locked_at(&self, at: NaiveDateTime) -> Option<NaiveDateTime> {
        self.locked_until.filter(|until| *until > at)
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    #[schema(example = "projects.manage")]
    pub name: String,
    #[schema(example = "projects")]
    pub category: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::user_permissions)]
pub struct UserPermission {
    pub id: String,
    pub user_id: String,
    pub permission_id: String,
    pub granted_by: Option<String>,
    pub granted_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::user_sessions)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// Catalog and portfolio
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::services)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[schema(example = "Residential Construction")]
    pub title: String,
    #[schema(example = "residential-construction")]
    pub slug: String,
    pub description: String,
    pub starting_price: Option<Decimal>,
    #[schema(example = "KES")]
    pub currency: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::projects)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: ProjectStatus,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_featured: bool,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::project_milestones)]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub sort_order: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::files)]
pub struct StoredFile {
    pub id: String,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::project_media)]
pub struct ProjectMedia {
    pub id: String,
    pub project_id: String,
    pub file_id: String,
    pub caption: Option<String>,
    pub sort_order: i32,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::blog_posts)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub status: BlogStatus,
    pub author_id: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl BlogPost {
    /// `published_at` is stamped on the first publish and never moved afterwards.
    pub fn publication_time(&self, at: NaiveDateTime) -> NaiveDateTime {
        self.published_at.unwrap_or(at)
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::settings)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub id: String,
    pub setting_key: String,
    pub setting_value: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// Intake
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::contact_submissions)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub submission_type: SubmissionType,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: SubmissionStatus,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// Logs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::audit_logs)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub user_id: Option<String>,
    #[schema(example = "submission.created")]
    pub action: String,
    #[schema(example = "contact_submission")]
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::system_logs)]
pub struct SystemLog {
    pub id: String,
    pub level: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// Finance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[schema(example = "Excavation works")]
    pub description: String,
    #[schema(value_type = String, example = "2")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "15000.00")]
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn amount(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub balance: Decimal,
}

impl DocumentTotals {
    /// `tax_rate` is a percentage. Tax is rounded half away from zero to cents.
    pub fn compute(
        items: &[LineItem],
        tax_rate: Decimal,
        discount: Decimal,
        amount_paid: Decimal,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(LineItem::amount).sum();
        let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let total = subtotal + tax_amount - discount;

        Self {
            subtotal,
            tax_amount,
            total,
            balance: total - amount_paid,
        }
    }
}

/// `QT-YYYYMMDD-0001` style numbering, sequence restarting daily.
pub fn quotation_number(date: NaiveDate, sequence: i64) -> String {
    format!("QT-{}-{:04}", date.format("%Y%m%d"), sequence)
}

pub fn quotation_prefix(date: NaiveDate) -> String {
    format!("QT-{}-", date.format("%Y%m%d"))
}

/// Highest sequence among `numbers` that carry `prefix`, or 0.
pub fn max_quotation_sequence<'a>(
    prefix: &str,
    numbers: impl IntoIterator<Item = &'a str>,
) -> i64 {
    numbers
        .into_iter()
        .filter_map(|n| n.strip_prefix(prefix))
        .filter_map(|seq| seq.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = crate::schema::quotations)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub id: String,
    #[schema(example = "QT-20250101-0001")]
    pub quotation_number: String,
    pub client_name: String,
    pub client_email: String,
    pub project_id: Option<String>,
    pub items: serde_json::Value,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: QuotationStatus,
    pub valid_until: Option<NaiveDate>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::invoices)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub quotation_id: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub items: serde_json::Value,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_text_enum_round_trip_and_alias() {
        assert_eq!("in_progress".parse::<ProjectStatus>().unwrap(), ProjectStatus::InProgress);
        assert_eq!("ongoing".parse::<ProjectStatus>().unwrap(), ProjectStatus::InProgress);
        assert_eq!(ProjectStatus::InProgress.as_str(), "in_progress");

        let err = "archived".parse::<ProjectStatus>().unwrap_err();
        assert_eq!(err.kind, "ProjectStatus");

        let status: ProjectStatus = serde_json::from_str("\"ongoing\"").unwrap();
        assert_eq!(status, ProjectStatus::InProgress);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_user_status_transitions() {
        use UserStatus::*;
        assert!(UserStatus::can_transition(Pending, Active, false));
        assert!(UserStatus::can_transition(Pending, Suspended, false));
        assert!(UserStatus::can_transition(Active, Suspended, false));
        assert!(!UserStatus::can_transition(Active, Pending, true));
        assert!(!UserStatus::can_transition(Suspended, Active, false));
        assert!(UserStatus::can_transition(Suspended, Active, true));
        assert!(!UserStatus::can_transition(Active, Active, true));
    }

    #[test]
    fn test_project_status_is_monotonic() {
        use ProjectStatus::*;
        assert!(ProjectStatus::can_transition(Planning, InProgress));
        assert!(ProjectStatus::can_transition(InProgress, OnHold));
        assert!(ProjectStatus::can_transition(OnHold, InProgress));
        assert!(ProjectStatus::can_transition(OnHold, Completed));
        assert!(!ProjectStatus::can_transition(Completed, InProgress));
        assert!(!ProjectStatus::can_transition(InProgress, Planning));
        assert!(!ProjectStatus::can_transition(Planning, Planning));
    }

    #[test]
    fn test_submission_status_is_forward_only() {
        use SubmissionStatus::*;
        assert!(SubmissionStatus::can_transition(New, Contacted));
        assert!(SubmissionStatus::can_transition(New, Closed));
        assert!(SubmissionStatus::can_transition(Responded, Closed));
        assert!(!SubmissionStatus::can_transition(Contacted, Responded));
        assert!(!SubmissionStatus::can_transition(Closed, New));
        assert!(Responded.is_response());
        assert!(!Closed.is_response());
    }

    #[test]
    fn test_document_totals() {
        let items = vec![
            LineItem {
                description: "Foundation".into(),
                quantity: dec("2"),
                unit_price: dec("1500.00"),
            },
            LineItem {
                description: "Roofing".into(),
                quantity: dec("1"),
                unit_price: dec("999.99"),
            },
        ];

        let totals = DocumentTotals::compute(&items, dec("16"), dec("100"), dec("1000"));

        assert_eq!(totals.subtotal, dec("3999.99"));
        // 639.9984 rounds to 640.00
        assert_eq!(totals.tax_amount, dec("640.00"));
        assert_eq!(totals.total, dec("4539.99"));
        assert_eq!(totals.balance, dec("3539.99"));
    }

    #[test]
    fn test_document_totals_empty() {
        let totals = DocumentTotals::compute(&[], dec("16"), dec("0"), dec("0"));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_quotation_number_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(quotation_number(date, 12), "QT-20250307-0012");
        assert!(quotation_number(date, 1).starts_with(&quotation_prefix(date)));
    }

    #[test]
    fn test_max_quotation_sequence_skips_gaps() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let prefix = quotation_prefix(date);
        let numbers = [
            "QT-20250307-0001",
            "QT-20250307-0003",
            "QT-20250307-9999",
            "QT-20250307-10000",
            "QT-20250306-0042",
        ];

        assert_eq!(max_quotation_sequence(&prefix, numbers), 10_000);
        assert_eq!(max_quotation_sequence(&prefix, ["QT-20250306-0042"]), 0);
    }

    #[test]
    fn test_blog_publication_time_is_sticky() {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let later = now();
        let mut post = BlogPost {
            id: new_id(),
            title: "Hello".into(),
            slug: "hello".into(),
            excerpt: None,
            content: "Body".into(),
            status: BlogStatus::Draft,
            author_id: None,
            published_at: None,
            created_at: first,
            updated_at: first,
        };

        assert_eq!(post.publication_time(first), first);
        post.published_at = Some(first);
        assert_eq!(post.publication_time(later), first);
    }

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(
            "a@b.co".into(),
            "hash".into(),
            "Jane".into(),
            "Doe".into(),
        );
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, UserStatus::Pending);
        assert!(!user.email_verified);
        assert_eq!(user.failed_login_attempts, 0);
        assert_eq!(user.full_name(), "Jane Doe");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "Jane");
    }

    #[test]
    fn test_locked_at() {
        let mut user = User::new("a@b.co".into(), "h".into(), "A".into(), "B".into());
        let at = now();
        assert!(user.locked_at(at).is_none());

        user.locked_until = Some(at + chrono::Duration::minutes(5));
        assert!(user.locked_at(at).is_some());
        assert!(user.locked_at(at + chrono::Duration::minutes(6)).is_none());
    }
}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "error_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// When the error happened, as reported by the source service
    pub timestamp: String,
    /// When the errors service stored it
    pub logged_at: String,
    pub source_service: String,
    pub level: String,
    pub error_message: String,
    pub error_code: Option<String>,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    pub request_user_id: Option<String>,
    pub request_ip_address: Option<String>,
    pub stack_trace: Option<String>,
    /// JSON object, stored as text
    pub additional_context: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

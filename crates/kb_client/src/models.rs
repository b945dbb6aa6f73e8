//! Wire DTOs of the knowledge-base backend (camelCase JSON).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_quota: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_storage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_usage_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmt_create: Option<String>,
}

/// `data` of login, register and refresh responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

// ---------------------------------------------------------------------------
// Search and question answering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchType {
    #[default]
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Semantic => "SEMANTIC",
            SearchType::Keyword => "KEYWORD",
            SearchType::Hybrid => "HYBRID",
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SEMANTIC" => Ok(SearchType::Semantic),
            "KEYWORD" => Ok(SearchType::Keyword),
            "HYBRID" => Ok(SearchType::Hybrid),
            other => Err(format!("unknown search type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub search_type: SearchType,
    pub max_results: u32,
    pub min_score: f64,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_type: SearchType::Semantic,
            max_results: 10,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub question: String,
    pub search_type: SearchType,
    pub max_results: u32,
    pub min_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

impl QuestionRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            search_type: SearchType::Semantic,
            max_results: 10,
            min_score: 0.7,
            context_window: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAskRequest {
    /// `None` lets the backend open a new conversation.
    pub conversation_id: Option<i64>,
    pub question: String,
    pub search_type: SearchType,
    pub max_results: u32,
    pub min_score: f64,
    pub enable_context: bool,
    pub context_message_count: u32,
}

impl ConversationAskRequest {
    pub fn new(conversation_id: Option<i64>, question: impl Into<String>) -> Self {
        Self {
            conversation_id,
            question: question.into(),
            search_type: SearchType::Hybrid,
            max_results: 5,
            min_score: 0.7,
            enable_context: true,
            context_message_count: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    pub document_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub score: Option<f64>,
    pub source: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
}

// ---------------------------------------------------------------------------
// Documents and vectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub tags: Option<String>,
    pub upload_time: Option<String>,
    pub chunk_count: Option<i32>,
    pub vector_count: Option<i32>,
    pub processing_status: Option<String>,
    pub download_url: Option<String>,
    pub preview_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorData {
    pub id: Option<String>,
    pub text: Option<String>,
    pub display_text: Option<String>,
    pub file_record_id: Option<String>,
    pub title: Option<String>,
    pub file_type: Option<String>,
    pub chunk_index: Option<i32>,
    pub tags: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conversation {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub session_name: Option<String>,
    pub session_summary: Option<String>,
    pub message_count: Option<i32>,
    pub last_message_time: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationMessage {
    pub id: Option<i64>,
    pub conversation_id: Option<i64>,
    pub message_type: Option<String>,
    pub content: Option<String>,
    pub source_count: Option<i32>,
    pub search_type: Option<String>,
    pub token_count: Option<i32>,
    pub response_time: Option<i32>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationAnswer {
    pub conversation_id: Option<i64>,
    pub session_name: Option<String>,
    pub message_id: Option<i64>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub sources: Vec<SearchResult>,
    pub source_count: Option<i32>,
    pub response_time: Option<i32>,
    pub token_count: Option<i32>,
    pub create_time: Option<String>,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub total_memory: Option<i64>,
    pub used_memory: Option<i64>,
    pub total_disk_space: Option<i64>,
    pub used_disk_space: Option<i64>,
    pub uptime: Option<String>,
    pub process_count: Option<i64>,
    pub load_average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dashboard {
    pub system_info: Option<SystemInfo>,
    pub user_stats: Value,
}

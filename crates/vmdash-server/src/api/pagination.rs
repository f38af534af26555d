use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};

/// 默认每页条数
pub const DEFAULT_PAGE_LIMIT: u64 = 50;
/// 每页条数上限
pub const MAX_PAGE_LIMIT: u64 = 200;

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

/// 兼容 `limit=20` 与 `limit="20"` 两种写法。
pub fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<U64Input>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

pub struct PaginationParams;

impl PaginationParams {
    pub fn resolve_limit(limit: Option<u64>) -> u64 {
        limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn resolve_offset(offset: Option<u64>) -> u64 {
        offset.unwrap_or(0)
    }
}

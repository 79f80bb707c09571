use serde::{Deserialize, Deserializer};

// blank text counts as a missing field, the same as null or an absent key
pub fn deserialize_non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

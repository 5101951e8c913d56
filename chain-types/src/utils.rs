/// Serde adapter for `u32` fields carried as hex strings in node RPC
/// responses (the `bits` field of `getblock`/`getblockheader`).
pub mod serde_u32_hex {
    pub fn serialize<S>(num: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{num:08x}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str: String = serde::Deserialize::deserialize(deserializer)?;
        u32::from_str_radix(&hex_str, 16).map_err(serde::de::Error::custom)
    }
}

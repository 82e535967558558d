use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Tags;

/// A distinct reading channel: one previously observed combination of
/// device, profile, source, resource, value type, units, media type and tags.
///
/// `id` is the surrogate key assigned by the storage layer and takes no part
/// in [`DeviceInfo::key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: i64,
    pub device_name: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub value_type: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub tags: Tags,
}

impl DeviceInfo {
    /// Content digest identifying this channel.
    ///
    /// Every field is length-prefixed before hashing so that adjacent fields
    /// cannot bleed into one another (`"ab" + "c"` vs `"a" + "bc"`).
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.device_name.as_str(),
            self.profile_name.as_str(),
            self.source_name.as_str(),
            self.resource_name.as_str(),
            self.value_type.as_str(),
            self.units.as_str(),
            self.media_type.as_str(),
        ] {
            hash_field(&mut hasher, field.as_bytes());
        }

        // BTreeMap serializes with sorted keys, so equal tag sets hash equally.
        let tags = serde_json::to_vec(&self.tags).unwrap_or_default();
        hash_field(&mut hasher, &tags);

        hex::encode(hasher.finalize())
    }

    pub fn has_source_name(&self) -> bool {
        !self.source_name.is_empty()
    }
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

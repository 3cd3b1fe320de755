//! Naming policy for archived frames and latest pointers.
//!
//! Archival names follow `{device}_{ts}[_f{index}]_{rand8}.jpg`. The device
//! component never contains `_`, so the originating device id is always
//! recoverable as the prefix before the first separator.

use rand::RngCore;

pub const IMAGE_EXT: &str = ".jpg";
pub const LATEST_PREFIX: &str = "latest_";
pub const LATEST_ALL: &str = "latest_all.jpg";
pub const UNKNOWN_DEVICE: &str = "unknown";

const MAX_COMPONENT_LEN: usize = 64;

/// Device ids that would collide with the latest-pointer namespace.
const RESERVED_DEVICE_IDS: [&str; 2] = ["all", "latest"];

/// Generate the 8-character hex disambiguator (4 random bytes).
pub fn disambiguator() -> String {
    let mut buf = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Sanitize a raw device identifier into a separator-free name component.
///
/// Anything outside `[A-Za-z0-9.-]` becomes `-` (including `_`, which is the
/// name separator). Ids with no alphanumeric content, and the reserved ids
/// `all`/`latest`, fall back to `unknown`.
pub fn sanitize_device(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_DEVICE.to_string();
    }
    let cleaned: String = trimmed
        .chars()
        .take(MAX_COMPONENT_LEN)
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => c,
            _ => '-',
        })
        .collect();
    if !cleaned.bytes().any(|b| b.is_ascii_alphanumeric()) {
        return UNKNOWN_DEVICE.to_string();
    }
    if RESERVED_DEVICE_IDS
        .iter()
        .any(|r| cleaned.eq_ignore_ascii_case(r))
    {
        return UNKNOWN_DEVICE.to_string();
    }
    cleaned
}

/// Sanitize a timestamp into a filesystem-safe name component.
///
/// `:`, `/` and `\` become `_`; any other character outside
/// `[A-Za-z0-9._-]` is dropped.
pub fn sanitize_timestamp(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '_',
            c => c,
        })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_COMPONENT_LEN)
        .collect()
}

/// Derive the archival file name for one frame.
///
/// `token` is the disambiguator, passed in so the caller can reuse it as a
/// correlation id in the metadata log.
pub fn frame_name(device: &str, timestamp: &str, frame_index: Option<u64>, token: &str) -> String {
    let device = sanitize_device(device);
    let ts = sanitize_timestamp(timestamp);
    match frame_index {
        Some(idx) => format!("{device}_{ts}_f{idx}_{token}{IMAGE_EXT}"),
        None => format!("{device}_{ts}_{token}{IMAGE_EXT}"),
    }
}

/// Name of a latest pointer: global (`None`) or per-device.
pub fn latest_name_for(device: Option<&str>) -> String {
    match device {
        Some(device) => format!("{LATEST_PREFIX}{}{IMAGE_EXT}", sanitize_device(device)),
        None => LATEST_ALL.to_string(),
    }
}

/// Whether `name` is a latest-pointer file.
pub fn is_latest_name(name: &str) -> bool {
    name.starts_with(LATEST_PREFIX) && has_image_ext(name)
}

/// Whether `name` is an archival frame (image file, not a pointer).
pub fn is_frame_name(name: &str) -> bool {
    has_image_ext(name) && !is_latest_name(name)
}

/// Recover the device id from an archival name: the prefix before the first
/// `_`, or the whole stem for names without a separator.
pub fn device_from_name(name: &str) -> &str {
    let stem = name
        .strip_suffix(IMAGE_EXT)
        .or_else(|| name.strip_suffix(".JPG"))
        .unwrap_or(name);
    match stem.split_once('_') {
        Some((device, _)) => device,
        None => stem,
    }
}

fn has_image_ext(name: &str) -> bool {
    name.len() >= IMAGE_EXT.len()
        && name
            .get(name.len() - IMAGE_EXT.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXT))
}

//! Media reference resolution against a public object-store URL

use crate::db::models::MediaType;
use crate::error::FeedError;

use super::{MediaResolver, ResolvedMedia};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

/// Resolves uploads served under `public_url/{group_id}/{key}`
#[derive(Debug, Clone)]
pub struct PublicUrlResolver {
    public_url: String,
}

impl PublicUrlResolver {
    pub fn new(public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

fn extension(reference: &str) -> Option<&str> {
    let leaf = reference.rsplit('/').next()?;
    let (_, ext) = leaf.rsplit_once('.')?;
    Some(ext)
}

/// Media type from keywords or extension; unknown references are images
pub fn media_type_for(reference: &str) -> MediaType {
    let lower = reference.to_ascii_lowercase();
    let ext = extension(&lower).unwrap_or("");

    if lower.contains("image") || IMAGE_EXTENSIONS.contains(&ext) {
        MediaType::Image
    } else if lower.contains("video") || VIDEO_EXTENSIONS.contains(&ext) {
        MediaType::Video
    } else if lower.contains("audio") || AUDIO_EXTENSIONS.contains(&ext) {
        MediaType::Audio
    } else {
        MediaType::Image
    }
}

/// MIME type from the extension
pub fn mime_type_for(reference: &str) -> &'static str {
    let lower = reference.to_ascii_lowercase();
    match extension(&lower).unwrap_or("") {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

impl MediaResolver for PublicUrlResolver {
    fn resolve(&self, raw: &str) -> Result<ResolvedMedia, FeedError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FeedError::Validation("Media reference is blank".into()));
        }

        let prefix = format!("{}/", self.public_url);
        let relative = raw.strip_prefix(&prefix).unwrap_or(raw);
        let leaf = relative.rsplit('/').next().unwrap_or("");
        if leaf.is_empty() {
            return Err(FeedError::Validation(format!(
                "Media reference '{}' has no object key",
                raw
            )));
        }

        Ok(ResolvedMedia {
            object_key: leaf.to_string(),
            mime_type: mime_type_for(raw).to_string(),
            media_type: media_type_for(raw),
        })
    }

    fn playable_url(&self, object_key: &str, group_id: &str) -> String {
        if object_key.starts_with(&format!("{}/", group_id)) {
            format!("{}/{}", self.public_url, object_key)
        } else {
            format!("{}/{}/{}", self.public_url, group_id, object_key)
        }
    }
}

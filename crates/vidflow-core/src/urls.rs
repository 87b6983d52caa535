//! Public playback URLs.
//!
//! Every URL is a pure function of the playback id and the configured hosts;
//! nothing here touches the network.

use crate::models::DerivedUrls;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUrlBuilder {
    image_host: String,
    stream_host: String,
    thumbnail_time_seconds: f64,
    download_quality: String,
}

impl PlaybackUrlBuilder {
    pub fn new(
        image_host: impl AsRef<str>,
        stream_host: impl AsRef<str>,
        thumbnail_time_seconds: f64,
        download_quality: impl Into<String>,
    ) -> Self {
        Self {
            image_host: normalize_host(image_host.as_ref()),
            stream_host: normalize_host(stream_host.as_ref()),
            thumbnail_time_seconds,
            download_quality: download_quality.into(),
        }
    }

    /// `https://<image-host>/<playback_id>/thumbnail.jpg?time=<seconds>`
    pub fn thumbnail_url(&self, playback_id: &str, time_seconds: f64) -> String {
        format!(
            "https://{}/{}/thumbnail.jpg?time={}",
            self.image_host, playback_id, time_seconds
        )
    }

    /// `https://<stream-host>/<playback_id>.m3u8`
    pub fn stream_url(&self, playback_id: &str) -> String {
        format!("https://{}/{}.m3u8", self.stream_host, playback_id)
    }

    /// `https://<stream-host>/<playback_id>/<quality>.mp4`
    pub fn download_url(&self, playback_id: &str) -> String {
        format!(
            "https://{}/{}/{}.mp4",
            self.stream_host, playback_id, self.download_quality
        )
    }

    pub fn derive(&self, playback_id: &str) -> DerivedUrls {
        DerivedUrls {
            thumbnail_url: self.thumbnail_url(playback_id, self.thumbnail_time_seconds),
            stream_url: self.stream_url(playback_id),
            download_url: self.download_url(playback_id),
        }
    }

    /// Derived URLs exist only once a playback id is known.
    pub fn derive_optional(&self, playback_id: Option<&str>) -> Option<DerivedUrls> {
        playback_id
            .filter(|id| !id.is_empty())
            .map(|id| self.derive(id))
    }

    pub fn thumbnail_time_seconds(&self) -> f64 {
        self.thumbnail_time_seconds
    }
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PlaybackUrlBuilder {
        PlaybackUrlBuilder::new("image.example.com", "https://stream.example.com/", 2.0, "high")
    }

    #[test]
    fn test_derive_formats() {
        let urls = builder().derive("PB1");
        assert_eq!(
            urls.thumbnail_url,
            "https://image.example.com/PB1/thumbnail.jpg?time=2"
        );
        assert_eq!(urls.stream_url, "https://stream.example.com/PB1.m3u8");
        assert_eq!(urls.download_url, "https://stream.example.com/PB1/high.mp4");
    }

    #[test]
    fn test_fractional_thumbnail_time() {
        assert_eq!(
            builder().thumbnail_url("PB1", 1.5),
            "https://image.example.com/PB1/thumbnail.jpg?time=1.5"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let b = builder();
        assert_eq!(b.derive("PB7"), b.derive("PB7"));
        assert_ne!(b.derive("PB7"), b.derive("PB8"));
    }

    #[test]
    fn test_no_urls_without_playback_id() {
        let b = builder();
        assert!(b.derive_optional(None).is_none());
        assert!(b.derive_optional(Some("")).is_none());
        assert!(b.derive_optional(Some("PB1")).is_some());
    }
}

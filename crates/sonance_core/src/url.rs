//! URL fixup before a URL reaches the playbin

/// A URL rewritten for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedUrl {
    pub uri: String,
    /// Device taken out of a `cdda://` URL, for the source-setup callback
    pub source_device: Option<String>,
}

/// Rewrite URLs the source elements cannot take as-is
///
/// - `file://host/share/file` (UNC style) becomes `file:////host/share/file`
/// - `cdda://<device>/<track>` becomes `cdda://<track>`, the device is
///   returned separately
pub fn fixup_url(url: &str) -> FixedUrl {
    if let Some(rest) = url.strip_prefix("file://") {
        if !rest.is_empty() && !rest.starts_with('/') {
            return FixedUrl {
                uri: format!("file:////{}", rest),
                source_device: None,
            };
        }
    }

    if let Some(rest) = url.strip_prefix("cdda://") {
        if let Some((device, track)) = rest.rsplit_once('/') {
            return FixedUrl {
                uri: format!("cdda://{}", track),
                source_device: (!device.is_empty()).then(|| device.to_string()),
            };
        }
    }

    FixedUrl {
        uri: url.to_string(),
        source_device: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_urls_untouched() {
        for url in ["file:///music/a.flac", "http://example.com/stream.mp3", "cdda://4"] {
            let fixed = fixup_url(url);
            assert_eq!(fixed.uri, url);
            assert_eq!(fixed.source_device, None);
        }
    }

    #[test]
    fn test_file_url_with_host() {
        let fixed = fixup_url("file://server/share/a.flac");
        assert_eq!(fixed.uri, "file:////server/share/a.flac");
    }

    #[test]
    fn test_cdda_device_extracted() {
        let fixed = fixup_url("cdda:///dev/sr0/3");
        assert_eq!(fixed.uri, "cdda://3");
        assert_eq!(fixed.source_device.as_deref(), Some("/dev/sr0"));
    }
}

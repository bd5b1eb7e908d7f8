//! Stream Metadata
//!
//! [`MetaBundle`] is what a pipeline reports with `MetadataFound`. It is
//! filled either from a tag message on the bus or from a discoverer result.
//!
//! ```text
//! TagList ──trim, bitrate / 1000──▶ MetaBundle ◀── AudioStreamInfo
//!              │                                      │
//!              └── title-only? split "a - t" / "a~t~b" └── FileType::from_description
//! ```

use serde::{Deserialize, Serialize};
use sonance_graph::{AudioStreamInfo, TagList};

/// Container/codec family of a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Unknown,
    Wav,
    Flac,
    WavPack,
    OggFlac,
    OggVorbis,
    OggOpus,
    OggSpeex,
    Mpeg,
    Mp4,
    Asf,
    Aiff,
    Mpc,
    TrueAudio,
    Dsf,
    Dsdiff,
    Pcm,
    Ape,
    Cdda,
    Stream,
}

impl FileType {
    /// Map a codec description as reported by the discoverer
    pub fn from_description(description: &str) -> Self {
        match description {
            "WAV" | "Waveform Audio" => FileType::Wav,
            "Free Lossless Audio Codec (FLAC)" | "FLAC" => FileType::Flac,
            "Wavpack" | "WavPack" => FileType::WavPack,
            "Vorbis" | "Ogg Vorbis" => FileType::OggVorbis,
            "Opus" | "Ogg Opus" => FileType::OggOpus,
            "Speex" | "Ogg Speex" => FileType::OggSpeex,
            "MPEG-1 Layer 3 (MP3)" | "MPEG-1 Layer 2 (MP2)" | "MPEG-1 Layer 1 (MP1)" => FileType::Mpeg,
            "MPEG-4 AAC" | "Apple Lossless Audio (ALAC)" => FileType::Mp4,
            "WMA" | "Windows Media Audio" => FileType::Asf,
            "Audio Interchange File Format (AIFF)" | "AIFF" => FileType::Aiff,
            "Musepack (SV7)" | "Musepack (SV8)" => FileType::Mpc,
            "TTA" | "True Audio" => FileType::TrueAudio,
            "DSD Stream File (DSF)" => FileType::Dsf,
            "Direct Stream Digital Interchange File Format (DSDIFF)" => FileType::Dsdiff,
            "Uncompressed PCM audio" | "PCM" => FileType::Pcm,
            "Monkey's Audio" | "APE" => FileType::Ape,
            "Audio CD" => FileType::Cdda,
            // Raw audio, e.g. "Uncompressed 16-bit PCM audio"
            d if d.starts_with("Uncompressed") => FileType::Pcm,
            _ => FileType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Unknown => "Unknown",
            FileType::Wav => "WAV",
            FileType::Flac => "FLAC",
            FileType::WavPack => "WavPack",
            FileType::OggFlac => "Ogg FLAC",
            FileType::OggVorbis => "Ogg Vorbis",
            FileType::OggOpus => "Ogg Opus",
            FileType::OggSpeex => "Ogg Speex",
            FileType::Mpeg => "MP3",
            FileType::Mp4 => "MP4 AAC",
            FileType::Asf => "Windows Media audio",
            FileType::Aiff => "AIFF",
            FileType::Mpc => "MPC",
            FileType::TrueAudio => "TrueAudio",
            FileType::Dsf => "DSF",
            FileType::Dsdiff => "DSDIFF",
            FileType::Pcm => "PCM",
            FileType::Ape => "Monkey's Audio",
            FileType::Cdda => "CDDA",
            FileType::Stream => "Stream",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata reported for the current (or next) stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaBundle {
    /// User-facing URL of the track
    pub url: String,
    /// URL actually played
    pub stream_url: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub comment: String,
    pub lyrics: String,
    /// kbit/s, 0 if unknown
    pub bitrate: u32,
    pub samplerate: u32,
    pub bitdepth: u32,
    pub filetype: FileType,
}

impl MetaBundle {
    /// Build a bundle from a tag list
    ///
    /// Strings are trimmed. A bundle carrying only a title gets artist (and
    /// album) split out of it, see [`split_title`].
    pub fn from_tags(tags: &TagList, url: &str, stream_url: &str) -> Self {
        let text = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or_default().to_string();

        let mut bundle = MetaBundle {
            url: url.to_string(),
            stream_url: stream_url.to_string(),
            title: text(&tags.title),
            artist: text(&tags.artist),
            album: text(&tags.album),
            comment: text(&tags.comment),
            lyrics: text(&tags.lyrics),
            bitrate: tags.bitrate.unwrap_or(0) / 1000,
            ..MetaBundle::default()
        };

        if !bundle.title.is_empty() && bundle.artist.is_empty() && bundle.album.is_empty() {
            if let Some(split) = split_title(&bundle.title) {
                bundle.artist = split.artist;
                bundle.title = split.title;
                if let Some(album) = split.album {
                    bundle.album = album;
                }
            }
        }
        bundle
    }

    /// Build a bundle from a discovered audio stream
    pub fn from_stream_info(info: &AudioStreamInfo, url: &str, stream_url: &str) -> Self {
        MetaBundle {
            url: url.to_string(),
            stream_url: stream_url.to_string(),
            samplerate: info.sample_rate,
            bitdepth: info.depth,
            bitrate: info.bitrate / 1000,
            filetype: FileType::from_description(&info.codec_description),
            ..MetaBundle::default()
        }
    }

    /// True when no tag field carries information
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.artist.is_empty()
            && self.album.is_empty()
            && self.comment.is_empty()
            && self.lyrics.is_empty()
            && self.bitrate == 0
            && self.samplerate == 0
            && self.bitdepth == 0
            && self.filetype == FileType::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSplit {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
}

/// Split a stream title into its parts
///
/// `"Artist - Title"` is tried first (first part is the artist, last part
/// the title). Otherwise a title with at least two `~` separators becomes
/// `artist~title~album`.
pub fn split_title(title: &str) -> Option<TitleSplit> {
    if title.contains(" - ") {
        let parts: Vec<&str> = title.split(" - ").collect();
        let (first, last) = (parts.first()?, parts.last()?);
        return Some(TitleSplit {
            artist: first.trim().to_string(),
            title: last.trim().to_string(),
            album: None,
        });
    }

    if title.matches('~').count() >= 2 {
        let mut parts = title.split('~');
        return Some(TitleSplit {
            artist: parts.next()?.to_string(),
            title: parts.next()?.to_string(),
            album: parts.next().map(str::to_string),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(title: Option<&str>, artist: Option<&str>) -> TagList {
        TagList {
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
            ..TagList::default()
        }
    }

    #[test]
    fn test_file_type_from_description() {
        assert_eq!(FileType::from_description("Free Lossless Audio Codec (FLAC)"), FileType::Flac);
        assert_eq!(FileType::from_description("MPEG-1 Layer 3 (MP3)"), FileType::Mpeg);
        assert_eq!(FileType::from_description("Wavpack"), FileType::WavPack);
        assert_eq!(FileType::from_description("Opus"), FileType::OggOpus);
        assert_eq!(FileType::from_description("MPEG-4 AAC"), FileType::Mp4);
        assert_eq!(FileType::from_description("Uncompressed 16-bit PCM audio"), FileType::Pcm);
        assert_eq!(FileType::from_description("something else"), FileType::Unknown);
    }

    #[test]
    fn test_split_dash_first() {
        let split = split_title("Daft Punk - Around the World").unwrap();
        assert_eq!(split.artist, "Daft Punk");
        assert_eq!(split.title, "Around the World");
        assert_eq!(split.album, None);

        // First and last part only
        let split = split_title("A - B - C").unwrap();
        assert_eq!((split.artist.as_str(), split.title.as_str()), ("A", "C"));

        // " - " wins over '~'
        let split = split_title("x~y~z - w").unwrap();
        assert_eq!(split.artist, "x~y~z");
    }

    #[test]
    fn test_split_tilde() {
        let split = split_title("Artist~Song~Album").unwrap();
        assert_eq!(split.artist, "Artist");
        assert_eq!(split.title, "Song");
        assert_eq!(split.album.as_deref(), Some("Album"));

        assert!(split_title("Only~One").is_none());
        assert!(split_title("Plain title").is_none());
    }

    #[test]
    fn test_bundle_from_tags() {
        let mut list = tags(Some("  Radio Host - Morning Show "), None);
        list.bitrate = Some(128_000);
        list.comment = Some(" live ".into());
        let bundle = MetaBundle::from_tags(&list, "http://radio/", "http://radio/stream");
        assert_eq!(bundle.url, "http://radio/");
        assert_eq!(bundle.stream_url, "http://radio/stream");
        assert_eq!(bundle.artist, "Radio Host");
        assert_eq!(bundle.title, "Morning Show");
        assert_eq!(bundle.comment, "live");
        assert_eq!(bundle.bitrate, 128);
    }

    #[test]
    fn test_title_kept_when_artist_present() {
        let list = tags(Some("Song - Remix"), Some("Artist"));
        let bundle = MetaBundle::from_tags(&list, "", "");
        assert_eq!(bundle.title, "Song - Remix");
        assert_eq!(bundle.artist, "Artist");
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = MetaBundle::from_tags(&TagList::default(), "file:///a.flac", "file:///a.flac");
        assert!(bundle.is_empty());

        let info = AudioStreamInfo {
            sample_rate: 44100,
            depth: 16,
            bitrate: 1_411_200,
            channels: 2,
            codec_description: "WAV".into(),
        };
        let bundle = MetaBundle::from_stream_info(&info, "a", "b");
        assert!(!bundle.is_empty());
        assert_eq!(bundle.bitrate, 1411);
        assert_eq!(bundle.filetype, FileType::Wav);
    }
}

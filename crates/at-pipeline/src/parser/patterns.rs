//! Release-title patterns and built-in parser defaults
//!
//! The working title has dots replaced by spaces before matching, so a `.`
//! inside a pattern (`h.264`, `DDP5.1`) deliberately matches either.

pub const RESOLUTION: &str = r"(?i)\b(\d{3,4}p)\b";

pub const VIDEO_CODEC: &str = r"(?i)\b(h.264|x264|h.265|x265|hevc|xvid|av1|mpeg-[24]|wmv|avc)\b";

pub const AUDIO_CODEC: &str =
    r"(?i)\b(DDP?5.1|AAC5.1|DDP|AAC|E-?AC-?3|AC-?3|TrueHD|DTS(?:-HD)?|FLAC|MP3|Atmos|OGG|Vorbis|ALAC)\b";

pub const UPLOAD_TYPE: &str =
    r"\b((?i:WEB-DL|WEBRip|WEB|BluRay)|MAX|AMZN|ATVP|HULU|HMAX|PROPER|REPACK|FINAL)\b";

/// `S01E02`; season then episode
pub const TV_SHOW: &str = r"(?i)\bS(\d{1,4})E(\d{1,4})";

/// `S01 E01-E05`, `S01 E01-05`, `Season 1 Episodes 1-5`
pub const TV_EPISODE_PACK: &str = r"(?i)\b(?:S(\d{1,4})|Season\s?(\d{1,4}))\s+(?:E\d{1,4}\s?-\s?E?\d{1,4}|Episodes?\s?\d{1,4}\s?-\s?\d{1,4})\b";

/// `S01` or `Season 1`
pub const TV_SEASON: &str = r"(?i)\b(?:S(\d{1,4})|Season\s?(\d{1,4}))\b";

/// A bare 19xx/20xx token; its boundaries are checked by the parser so
/// adjacent years (`1917 2019`) both stay matchable
pub const YEAR: &str = r"(?:19|20)\d{2}";

/// Characters allowed directly before a year
pub const YEAR_OPEN: &str = "([";

/// Characters allowed directly after a year
pub const YEAR_CLOSE: &str = ")]";

/// Canonical spellings for case-insensitive upload types
pub const UPLOAD_TYPE_CANONICAL: [&str; 4] = ["WEB-DL", "WEBRip", "WEB", "BluRay"];

pub fn default_replacements() -> Vec<(String, String)> {
    [
        ("www.UIndex.org    -    ", ""),
        ("www.Torrenting.com   -    ", ""),
        ("www.1TamilMV.com - ", ""),
        ("[eztvx.to]", ""),
        ("[eztv]", ""),
        ("[TGx]", ""),
        ("[rartv]", ""),
        ("[rarbg]", ""),
        (".", " "),
        ("_", " "),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

pub fn default_uploaders() -> Vec<String> {
    [
        "YTS.MX", "YTS.LT", "YTS.AM", "YIFY", "EDITH", "FLUX", "NTb", "MeGusta", "ELiTE",
        "playWEB", "SuccessfulCrab", "BiOMA", "EZTVx", "TGx", "GalaxyRG", "RARBG", "NOGRP",
        "CAKES", "SYNCOPY", "KiNGS", "ETHEL", "TEPES", "SMURF", "APEX", "LAMA", "PSA", "QxR",
        "Tigole", "NeoNoir", "FGT",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

//! Content-type guessing from file extensions.

use std::path::Path;

use swiftdesk_common::DEFAULT_CONTENT_TYPE;

/// Guess the Content-Type for an upload from its extension.
///
/// Covers the types the client actually surfaces (documents, images, video,
/// audio, DICOM); everything else is `application/octet-stream`.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext: String = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return DEFAULT_CONTENT_TYPE,
    };

    match ext.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "dcm" => "application/dicom",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

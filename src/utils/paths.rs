//! Output and temp path layout for download tasks

use std::path::{Path, PathBuf};

const MAX_TITLE_CHARS: usize = 60;

/// Replace characters that are not allowed in file names and cap the length
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '_',
            c => c,
        })
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Every file a task touches
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPaths {
    pub output_dir: PathBuf,
    pub output_path: PathBuf,
    pub video_tmp_path: PathBuf,
    pub audio_tmp_path: PathBuf,
}

impl TaskPaths {
    /// Lay out paths for one task.
    ///
    /// The output file is `{title}-{bvid}.mp4`, placed in `download_dir` or in a
    /// folder of the same name when `folder_per_task` is set. Raw payloads go to
    /// `temp_dir`, keyed by task id so concurrent tasks never collide.
    pub fn new(
        download_dir: &Path,
        temp_dir: &Path,
        folder_per_task: bool,
        task_id: &str,
        title: &str,
        bvid: &str,
    ) -> Self {
        let file_name = format!("{}-{}", sanitize_filename(title), bvid);
        let output_dir = if folder_per_task {
            download_dir.join(&file_name)
        } else {
            download_dir.to_path_buf()
        };
        let output_path = output_dir.join(format!("{}.mp4", file_name));

        Self {
            output_dir,
            output_path,
            video_tmp_path: temp_dir.join(format!("{}-video.m4s", task_id)),
            audio_tmp_path: temp_dir.join(format!("{}-audio.m4s", task_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename(r#"a/b\c?d%e*f:g|h"i<j>k"#), "a_b_c_d_e_f_g_h_i_j_k");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let title = "标".repeat(80);
        let sanitized = sanitize_filename(&title);
        assert_eq!(sanitized.chars().count(), 60);
    }

    #[test]
    fn test_flat_layout() {
        let paths = TaskPaths::new(
            Path::new("/dl"),
            Path::new("/tmp"),
            false,
            "t1",
            "My: Video",
            "BV1xx",
        );
        assert_eq!(paths.output_dir, PathBuf::from("/dl"));
        assert_eq!(paths.output_path, PathBuf::from("/dl/My_ Video-BV1xx.mp4"));
        assert_eq!(paths.video_tmp_path, PathBuf::from("/tmp/t1-video.m4s"));
        assert_eq!(paths.audio_tmp_path, PathBuf::from("/tmp/t1-audio.m4s"));
    }

    #[test]
    fn test_folder_per_task_layout() {
        let paths = TaskPaths::new(
            Path::new("/dl"),
            Path::new("/tmp"),
            true,
            "t1",
            "Clip",
            "BV1yy",
        );
        assert_eq!(paths.output_dir, PathBuf::from("/dl/Clip-BV1yy"));
        assert_eq!(
            paths.output_path,
            PathBuf::from("/dl/Clip-BV1yy/Clip-BV1yy.mp4")
        );
    }
}

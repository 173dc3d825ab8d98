//! `latex` + `dvipng` adapter.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::{Artifact, RenderOutcome, Typesetter};
use crate::error::TypesetError;

/// Files removed after rendering unless `keep_files` is set.
const INTERMEDIATE_EXTENSIONS: [&str; 4] = ["tex", "dvi", "log", "aux"];

/// Settings for [`LatexToolchain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypesetConfig {
    /// LaTeX compiler producing DVI.
    pub latex: String,

    /// DVI to PNG converter.
    pub dvipng: String,

    /// Load the breqn package so `dmath*` environments work.
    pub breqn: bool,

    /// Document font size in points.
    pub point_size: u32,

    /// Image resolution.
    pub dpi: u32,

    /// `-T` option of dvipng.
    pub bounding_box: String,

    pub background: String,
    pub foreground: String,

    /// `-O` option of dvipng.
    pub offset: String,

    /// `-bd` option of dvipng.
    pub border: String,

    /// Keep the intermediate files next to the image.
    pub keep_files: bool,

    /// Where files are written (system temp dir when `None`).
    pub output_dir: Option<PathBuf>,

    /// Deadline per tool invocation.
    pub timeout: Duration,
}

impl Default for TypesetConfig {
    fn default() -> Self {
        Self {
            latex: "latex".to_string(),
            dvipng: "dvipng".to_string(),
            breqn: true,
            point_size: 10,
            dpi: 120,
            bounding_box: "tight".to_string(),
            background: "Transparent".to_string(),
            foreground: "Blue".to_string(),
            offset: "0cm,0cm".to_string(),
            border: "0".to_string(),
            keep_files: false,
            output_dir: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Renders math by running `latex` and then `dvipng`.
#[derive(Debug, Clone, Default)]
pub struct LatexToolchain {
    config: TypesetConfig,
}

impl LatexToolchain {
    pub fn new(config: TypesetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TypesetConfig {
        &self.config
    }

    /// Wrap `source` in a complete document.
    pub fn document(&self, source: &str) -> String {
        let packages = if self.config.breqn {
            "\\usepackage{amssymb,amsmath}\n\\usepackage{breqn}\n"
        } else {
            "\\usepackage{amssymb,amsmath}\n"
        };
        format!(
            "\\documentclass[{}pt]{{article}}\n{}\\pagestyle{{empty}}\n\\begin{{document}}\n{}\n\\end{{document}}\n",
            self.config.point_size, packages, source
        )
    }

    /// Arguments for the compiler run.
    pub fn latex_args(&self, output_dir: &Path, tex: &Path) -> Vec<OsString> {
        let mut dir_arg = OsString::from("-output-directory=");
        dir_arg.push(output_dir);
        vec!["-halt-on-error".into(), dir_arg, tex.into()]
    }

    /// Arguments for the image conversion.
    pub fn dvipng_args(&self, dvi: &Path, png: &Path) -> Vec<OsString> {
        let config = &self.config;
        let mut args: Vec<OsString> = [
            "-T",
            &config.bounding_box,
            "-D",
            &config.dpi.to_string(),
            "-bg",
            &config.background,
            "-fg",
            &config.foreground,
            "-O",
            &config.offset,
            "-bd",
            &config.border,
            "-o",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(png.into());
        args.push(dvi.into());
        args
    }

    fn output_dir(&self) -> PathBuf {
        self.config
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    fn stage_source(&self, dir: &Path, source: &str) -> Result<PathBuf, TypesetError> {
        let mut file = tempfile::Builder::new()
            .prefix("tex_")
            .suffix(".tex")
            .tempfile_in(dir)?;
        file.write_all(self.document(source).as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path().keep().map_err(|e| e.error)?)
    }

    async fn run_tool(
        &self,
        tool: &str,
        args: &[OsString],
        dir: &Path,
        artifact: &Path,
    ) -> Result<RenderOutcome, TypesetError> {
        debug!("running {} {:?}", tool, args);
        let mut command = Command::new(tool);
        command.args(args).current_dir(dir).kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| TypesetError::Timeout(self.config.timeout))?
            .map_err(|source| TypesetError::Launch {
                tool: tool.to_string(),
                source,
            })?;

        let outcome = RenderOutcome {
            tool: tool.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            artifact: Some(artifact.to_path_buf()),
        };

        if !outcome.is_success() {
            return Err(TypesetError::ToolFailed {
                tool: outcome.tool,
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }
        if !artifact.exists() {
            return Err(TypesetError::MissingArtifact(artifact.to_path_buf()));
        }
        Ok(outcome)
    }

    async fn compile(&self, dir: &Path, tex: &Path) -> Result<Artifact, TypesetError> {
        let dvi = tex.with_extension("dvi");
        let png = tex.with_extension("png");

        let latex = self
            .run_tool(&self.config.latex, &self.latex_args(dir, tex), dir, &dvi)
            .await?;
        let dvipng = self
            .run_tool(&self.config.dvipng, &self.dvipng_args(&dvi, &png), dir, &png)
            .await?;

        Ok(Artifact {
            path: png,
            steps: vec![latex, dvipng],
        })
    }

    fn cleanup(&self, tex: &Path) {
        if self.config.keep_files {
            return;
        }
        for extension in INTERMEDIATE_EXTENSIONS {
            let path = tex.with_extension(extension);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Typesetter for LatexToolchain {
    async fn render(&self, source: &str) -> Result<Artifact, TypesetError> {
        let dir = self.output_dir();
        let tex = self.stage_source(&dir, source)?;

        let result = self.compile(&dir, &tex).await;
        self.cleanup(&tex);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain_in(dir: &Path, latex: &str) -> LatexToolchain {
        LatexToolchain::new(TypesetConfig {
            latex: latex.to_string(),
            output_dir: Some(dir.to_path_buf()),
            timeout: Duration::from_secs(10),
            ..Default::default()
        })
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_document_preamble() {
        let toolchain = LatexToolchain::default();
        let doc = toolchain.document("$$x^{2}$$");
        assert!(doc.starts_with("\\documentclass[10pt]{article}\n"));
        assert!(doc.contains("\\usepackage{breqn}\n"));
        assert!(doc.ends_with(
            "\\pagestyle{empty}\n\\begin{document}\n$$x^{2}$$\n\\end{document}\n"
        ));

        let plain = LatexToolchain::new(TypesetConfig {
            breqn: false,
            point_size: 12,
            ..Default::default()
        });
        let doc = plain.document("x");
        assert!(doc.starts_with("\\documentclass[12pt]{article}\n"));
        assert!(!doc.contains("breqn"));
    }

    #[test]
    fn test_tool_arguments() {
        let toolchain = LatexToolchain::default();
        assert_eq!(
            toolchain.latex_args(Path::new("/tmp"), Path::new("/tmp/tex_a.tex")),
            vec!["-halt-on-error", "-output-directory=/tmp", "/tmp/tex_a.tex"]
        );
        assert_eq!(
            toolchain.dvipng_args(Path::new("/tmp/tex_a.dvi"), Path::new("/tmp/tex_a.png")),
            vec![
                "-T",
                "tight",
                "-D",
                "120",
                "-bg",
                "Transparent",
                "-fg",
                "Blue",
                "-O",
                "0cm,0cm",
                "-bd",
                "0",
                "-o",
                "/tmp/tex_a.png",
                "/tmp/tex_a.dvi",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_tool_is_reported_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = toolchain_in(dir.path(), "false");

        match toolchain.render("$$x$$").await {
            Err(TypesetError::ToolFailed {
                tool, exit_code, ..
            }) => {
                assert_eq!(tool, "false");
                assert_ne!(exit_code, 0);
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = toolchain_in(dir.path(), "/nonexistent/latex");

        let result = toolchain.render("$$x$$").await;
        assert!(matches!(result, Err(TypesetError::Launch { .. })));
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = toolchain_in(dir.path(), "true");

        let result = toolchain.render("$$x$$").await;
        match result {
            Err(TypesetError::MissingArtifact(path)) => {
                assert_eq!(path.extension().and_then(|e| e.to_str()), Some("dvi"));
            }
            other => panic!("expected MissingArtifact, got {:?}", other),
        }
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_keep_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = toolchain_in(dir.path(), "true").config().clone();
        config.keep_files = true;
        let toolchain = LatexToolchain::new(config);

        assert!(toolchain.render("$$x$$").await.is_err());
        let kept: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(kept.len(), 1);
    }
}

//! Reading program images from disk

use camino::{Utf8Path, Utf8PathBuf};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use tracing::info;

use crate::compiler::{compile, Image, ImageError};
use crate::parser::{parse, ParseError};

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("input file {path} does not exist")]
    #[diagnostic(code(twomode::load::missing))]
    InputFileMissing { path: Utf8PathBuf },

    #[error("could not read {path}")]
    #[diagnostic(code(twomode::load::io))]
    Io {
        path: Utf8PathBuf,

        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Image(#[from] ImageError),
}

impl LoadError {
    /// Where in the source the error happened, if it comes from its content
    #[must_use]
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            LoadError::InputFileMissing { .. } | LoadError::Io { .. } => None,
            LoadError::Parse(e) => Some(e.span()),
            LoadError::Image(e) => Some(e.span()),
        }
    }
}

/// Read the content of a program file
///
/// # Errors
///
/// Fails with [`LoadError::InputFileMissing`] if the file does not exist, or
/// [`LoadError::Io`] if it could not be read.
pub fn read_program(path: &Utf8Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::InputFileMissing {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Parse and lay out a program from its text
///
/// # Errors
///
/// Fails if the program is malformed or does not fit in memory
pub fn load_str(source: &str) -> Result<Image, LoadError> {
    let program = parse(source)?;
    Ok(compile(&program)?)
}

/// Read, parse and lay out a program file.
///
/// The source text is returned along the image, so that errors can be
/// reported against it.
///
/// # Errors
///
/// Fails if the file cannot be read, or if its content is not a valid program
#[tracing::instrument]
pub fn load(path: &Utf8Path) -> Result<(String, Image), LoadError> {
    let source = read_program(path)?;
    let image = load_str(&source)?;
    info!(cells = image.len(), "Loaded program");
    Ok((source, image))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_test() {
        let err = load(Utf8Path::new("/this/file/does/not/exist.txt")).unwrap_err();
        assert!(matches!(err, LoadError::InputFileMissing { .. }));
        assert_eq!(err.span(), None);
        insta::assert_snapshot!(err.to_string(), @"input file /this/file/does/not/exist.txt does not exist");
    }

    #[test]
    fn load_str_test() {
        let image = load_str(indoc! {"
            1     // load 65
            65
            9     // put on port 2
            2
            50
        "})
        .unwrap();
        assert_eq!(
            image.iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 65), (2, 9), (3, 2), (4, 50)]
        );
    }

    #[test]
    fn errors_carry_spans_test() {
        let err = load_str("1\n.abc\n").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
        assert_eq!(err.span(), Some((2..3).into()));

        let err = load_str(".3000\n1\n").unwrap_err();
        assert!(matches!(err, LoadError::Image(_)));
        assert_eq!(err.span(), Some((0..5).into()));
    }

    #[test]
    fn load_file_test() {
        let dir = std::env::temp_dir();
        let path = Utf8PathBuf::from_path_buf(dir.join("twomode-loader-test.txt")).unwrap();
        std::fs::write(&path, "1\n7\n50\n").unwrap();

        let (source, image) = load(&path).unwrap();
        assert_eq!(source, "1\n7\n50\n");
        assert_eq!(image.get(1), Some(7));

        std::fs::remove_file(&path).unwrap();
    }
}

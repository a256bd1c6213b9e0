use std::collections::BTreeMap;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use tracing::{debug, trace};

use crate::constants::{self as C, Address, Word};
use crate::parser::{Line, Program};

/// Initial content of the memory, as laid out from a program
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Image {
    cells: BTreeMap<Address, Word>,
}

impl Image {
    #[must_use]
    pub fn get(&self, address: Address) -> Option<Word> {
        self.cells.get(&address).copied()
    }

    /// Iterate over the filled cells, by increasing address
    pub fn iter(&self) -> impl Iterator<Item = (Address, Word)> + '_ {
        self.cells.iter().map(|(a, w)| (*a, *w))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ImageError {
    #[error("relocation to address {address} is outside of memory")]
    #[diagnostic(code(twomode::image::relocation))]
    RelocationOutOfRange {
        address: Address,

        #[label("relocated here")]
        span: SourceSpan,
    },

    #[error("value would be placed at address {address}, past the end of memory")]
    #[diagnostic(code(twomode::image::overflow))]
    ImageOverflow {
        address: Address,

        #[label("this value does not fit")]
        span: SourceSpan,
    },
}

impl ImageError {
    #[must_use]
    pub fn span(&self) -> SourceSpan {
        match self {
            ImageError::RelocationOutOfRange { span, .. } | ImageError::ImageOverflow { span, .. } => {
                *span
            }
        }
    }
}

fn in_memory(address: Address) -> bool {
    usize::try_from(address).is_ok_and(|a| a < C::MEMORY_SIZE)
}

/// Lays out the memory
///
/// Values are placed one after the other from address 0, and relocations move
/// the position of the next value. A later value overwrites an earlier one at
/// the same address.
///
/// # Errors
///
/// Fails if a relocation or a value falls outside of the memory
#[tracing::instrument(skip(program))]
pub fn compile(program: &Program) -> Result<Image, ImageError> {
    let mut image = Image::default();
    let mut position = C::PROGRAM_START;

    for line in program.items() {
        let span = SourceSpan::from(line.location.clone());
        match line.inner {
            Line::Relocate(address) => {
                if !in_memory(address) {
                    return Err(ImageError::RelocationOutOfRange { address, span });
                }
                trace!(address, "Relocating");
                position = address;
            }

            Line::Value(word) => {
                if !in_memory(position) {
                    return Err(ImageError::ImageOverflow {
                        address: position,
                        span,
                    });
                }
                trace!(address = position, word, "Placing value");
                image.cells.insert(position, word);
                position += 1;
            }

            Line::Comment => {}
        }
    }

    debug!(cells = image.len(), "Laid out program");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;
    use crate::runtime::Memory;

    fn compile_str(input: &str) -> Result<Image, ImageError> {
        compile(&parse(input).unwrap())
    }

    #[test]
    fn layout_test() {
        let image = compile_str(indoc! {"
            1
            5
            50
            .1000
            30
            .10
            7
        "})
        .unwrap();

        assert_eq!(
            image.iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 5), (2, 50), (10, 7), (1000, 30)]
        );
    }

    #[test]
    fn comments_and_indentation_test() {
        // Comment lines do not take a cell, indented values do
        let image = compile_str(indoc! {"
            // header
            1
              5   // indented
            # another comment
            50
        "})
        .unwrap();

        assert_eq!(
            image.iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 5), (2, 50)]
        );
    }

    #[test]
    fn overwrite_test() {
        let image = compile_str("1\n2\n.0\n3\n").unwrap();
        assert_eq!(image.get(0), Some(3));
        assert_eq!(image.get(1), Some(2));
        assert_eq!(image.len(), 2);
    }

    #[test]
    fn errors_test() {
        assert_eq!(
            compile_str("1\n.2000\n"),
            Err(ImageError::RelocationOutOfRange {
                address: 2000,
                span: (2..7).into()
            })
        );

        assert_eq!(
            compile_str(".1999\n1\n2\n"),
            Err(ImageError::ImageOverflow {
                address: 2000,
                span: (8..9).into()
            })
        );

        // Relocating to the last cell and filling it is fine
        assert!(compile_str(".1999\n1\n").is_ok());
    }

    #[test]
    fn memory_from_image_test() {
        let image = compile_str("1\n42\n.1500\n30\n").unwrap();
        let memory = Memory::from_image(&image);
        assert_eq!(memory.get(1), Ok(42));
        assert_eq!(memory.get(1500), Ok(30));
        assert_eq!(memory.non_zero().count(), 3);
    }
}

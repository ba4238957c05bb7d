//! Reading and writing the line-oriented map format.
//!
//! One city per line, the name first, then any of its roads:
//!
//! ```text
//! Foo north=Bar west=Baz south=Qu-ux
//! Bar south=Foo west=Bee
//! ```
//!
//! Directions are optional and may come in any order. A city named only as a
//! neighbor still exists in the graph, it just has no roads of its own.
//! Writing emits the declared cities that pass a filter, in the order they were
//! read, with their current roads. Reading a canonical file (single spaces,
//! trailing newline) and writing it back reproduces it byte for byte.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use invasion_types::{CityId, Direction};
use tracing::debug;

use crate::atlas::Atlas;
use crate::error::WorldError;

/// Parse a whole map.
///
/// # Errors
///
/// Returns [`WorldError::MalformedLine`] for a token that is not
/// `direction=name`, an unknown direction, an empty neighbor or a direction
/// used twice on one line. Also fails on duplicate declarations, self-loops
/// and invalid city names.
pub fn parse(text: &str) -> Result<Atlas, WorldError> {
    let mut atlas = Atlas::new();
    for (index, line) in text.lines().enumerate() {
        let number = index.saturating_add(1);
        if line.trim().is_empty() {
            continue;
        }
        parse_line(&mut atlas, line, number)?;
    }
    debug!(
        cities = atlas.len(),
        declared = atlas.declared().len(),
        "Map parsed"
    );
    Ok(atlas)
}

fn parse_line(atlas: &mut Atlas, line: &str, number: usize) -> Result<(), WorldError> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(());
    };
    let city = atlas.declare(name, number)?;

    let mut seen: Vec<Direction> = Vec::with_capacity(Direction::ALL.len());
    for token in tokens {
        let (key, neighbor) = token.split_once('=').ok_or_else(|| WorldError::MalformedLine {
            line: number,
            reason: format!("expected direction=name, found {token:?}"),
        })?;
        let direction: Direction = key.parse().map_err(|err| WorldError::MalformedLine {
            line: number,
            reason: format!("{err}"),
        })?;
        if neighbor.is_empty() {
            return Err(WorldError::MalformedLine {
                line: number,
                reason: format!("missing city after {direction}="),
            });
        }
        if seen.contains(&direction) {
            return Err(WorldError::MalformedLine {
                line: number,
                reason: format!("{direction} given more than once"),
            });
        }
        seen.push(direction);

        let target = atlas.intern(neighbor)?;
        atlas.link(city, direction, target)?;
    }
    Ok(())
}

/// Read and parse a map file.
///
/// # Errors
///
/// Returns [`WorldError::Io`] if the file cannot be read, otherwise the same
/// errors as [`parse`].
pub fn read_file(path: &Path) -> Result<Atlas, WorldError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Render the declared cities accepted by `keep` in map format.
///
/// # Errors
///
/// Returns [`WorldError::CityBusy`] if a city's lock is held elsewhere, which
/// only happens when rendering while a game is still running.
pub fn render<F>(atlas: &Atlas, keep: F) -> Result<String, WorldError>
where
    F: Fn(CityId) -> bool,
{
    let mut out = String::new();
    for id in atlas.declared().iter().copied().filter(|id| keep(*id)) {
        let city = atlas.city(id).ok_or(WorldError::CityNotFound(id))?;
        let guard = city.try_lock().ok_or_else(|| WorldError::CityBusy {
            name: city.name().to_owned(),
        })?;
        out.push_str(city.name());
        for (direction, target) in guard.neighbors().iter() {
            let neighbor = atlas.city(target).ok_or(WorldError::CityNotFound(target))?;
            // Writing into a String cannot fail.
            let _ = write!(out, " {direction}={}", neighbor.name());
        }
        out.push('\n');
    }
    Ok(out)
}

/// Write the declared cities accepted by `keep` to `writer`.
///
/// # Errors
///
/// Same as [`render`], plus [`WorldError::Io`] if writing fails.
pub fn write<F, W>(atlas: &Atlas, keep: F, mut writer: W) -> Result<(), WorldError>
where
    F: Fn(CityId) -> bool,
    W: Write,
{
    let text = render(atlas, keep)?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Write the declared cities accepted by `keep` to the file at `path`.
///
/// # Errors
///
/// Same as [`write`].
pub fn write_file<F>(path: &Path, atlas: &Atlas, keep: F) -> Result<(), WorldError>
where
    F: Fn(CityId) -> bool,
{
    let file = std::fs::File::create(path)?;
    write(atlas, keep, std::io::BufWriter::new(file))
}

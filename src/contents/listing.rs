use std::collections::HashSet;
use std::fs;

use compact_str::CompactString;

use crate::config::{Config, GOPHERMAP};
use crate::ext::BytesVec;
use crate::path::RequestPath;
use crate::protocol::{classify, line, ItemType};
use crate::Error;


/// Names a gophermap hid from the listing of its directory.
pub type Hidden = HashSet<CompactString>;


/// Appends a menu listing the directory at `dir`.
///
/// The menu starts with a title naming the directory, a blank line and a
/// link to the parent directory, followed by the entries sorted by name.
/// Dotfiles, gophermaps, `hidden` names and restricted names are left out,
/// as is anything that is neither a directory nor a regular file. No last
/// line is written.
///
/// # Errors
/// Returns [`Error::DirList`] if the directory cannot be enumerated.
pub fn render<B: BytesVec>(out: &mut B, dir: &RequestPath, hidden: &Hidden, config: &Config) -> Result<(), Error> {
    let mut names: Vec<CompactString> = fs::read_dir(dir.abs())
        .map_err(Error::DirList)?
        .filter_map(|entry| entry.ok()?.file_name().to_str().map(CompactString::from))
        .filter(|name| {
            !name.starts_with('.') && !name.ends_with(GOPHERMAP)
                && !hidden.contains(name) && !config.is_restricted_file(name)
        })
        .collect();
    names.sort_unstable();

    let host = &config.host;
    let width = config.page_width;
    line::title_line(out, &format!("[ {}{} ]", host.name, dir.selector()), width);
    line::info_line(out, "", width);
    line::menu_line(out, ItemType::Directory, "..", &dir.parent().selector(), &host.name, host.port, width)?;

    for name in names {
        let entry = dir.join(&name);
        // Follows symlinks, unlike `DirEntry::file_type`
        let Ok(meta) = fs::metadata(entry.abs()) else {
            continue;
        };
        let item = if meta.is_dir() {
            ItemType::Directory
        } else if meta.is_file() {
            classify(&name)
        } else {
            continue;
        };
        line::menu_line(out, item, &name, &entry.selector(), &host.name, host.port, width)?;
    }
    Ok(())
}

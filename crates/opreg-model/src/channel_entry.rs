use crate::{ChannelName, CsvName, EntryId, PackageName};

/// A node in a channel's upgrade graph. `depth=0` is the head; each step
/// along a `replaces` edge increments depth. Synthesized entries (skip
/// placeholders and their shadow replacers, see `spec.md` §3/§4.4) are
/// ordinary rows of this same shape — there is no separate "synthetic"
/// variant, only a flag recording provenance for diagnostics.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub entry_id: EntryId,
    pub package_name: PackageName,
    pub channel_name: ChannelName,
    pub bundle_name: CsvName,
    pub depth: i64,
    pub replaces: Option<EntryId>,
    pub synthesized: bool,
}

impl ChannelEntry {
    pub fn is_head(&self) -> bool {
        self.depth == 0
    }
}

/// How a new bundle is stitched into an existing package's channel graph.
/// `spec.md` §4.4 describes all three; kept as an enum rather than the
/// source's struct-of-function-pointer option builders (`spec.md` §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Follow each bundle's declared `replaces`/`skips`. The default and
    /// primary flow.
    #[default]
    Replaces,
    /// Sort strictly by semantic version; ignore declared `replaces`.
    SemVer,
    /// Like `SemVer`, but bundles sharing major.minor mutually skip rather
    /// than each advancing depth.
    SkipPatch,
}

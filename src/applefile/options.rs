use std::sync::atomic::{AtomicBool, Ordering};

static DEFAULT_COLOUR_QUIRKS: AtomicBool = AtomicBool::new(false);
static DEFAULT_MONOCHROME: AtomicBool = AtomicBool::new(false);

/// How images are rendered.  Decoders take these explicitly; the process
/// wide defaults exist only for front ends that keep a global preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderOptions {
    /// Apply the hi-res colour artifact corrections.
    pub colour_quirks: bool,
    /// Render set bits as white and clear bits as black.
    pub monochrome: bool,
}

impl RenderOptions {
    pub fn new(colour_quirks: bool, monochrome: bool) -> RenderOptions {
        RenderOptions {
            colour_quirks,
            monochrome,
        }
    }

    /// The options currently selected as process-wide defaults.
    pub fn defaults() -> RenderOptions {
        RenderOptions {
            colour_quirks: DEFAULT_COLOUR_QUIRKS.load(Ordering::Relaxed),
            monochrome: DEFAULT_MONOCHROME.load(Ordering::Relaxed),
        }
    }
}

pub fn set_default_colour_quirks(value: bool) {
    DEFAULT_COLOUR_QUIRKS.store(value, Ordering::Relaxed);
}

pub fn set_default_monochrome(value: bool) {
    DEFAULT_MONOCHROME.store(value, Ordering::Relaxed);
}

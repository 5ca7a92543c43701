use std::sync::OnceLock;
use zyscope_misc::props;

static INSTANCE: OnceLock<OatHookConfigs> = OnceLock::new();

const SCAN_WORDS_PROP: &str = "persist.zyscope.oat.scan_words";
const DEFAULT_SCAN_WORDS: usize = 10;
const MAX_SCAN_WORDS: usize = 64;

#[derive(Debug)]
pub struct OatHookConfigs {
    pub compiler_fragment: &'static str,
    pub symbol: &'static str,
    pub scan_words: usize,
}

impl OatHookConfigs {
    pub fn instance() -> &'static Self {
        INSTANCE.get_or_init(Self::from_props)
    }

    fn from_props() -> Self {
        let scan_words = props::get_parsed(SCAN_WORDS_PROP, DEFAULT_SCAN_WORDS);

        Self {
            compiler_fragment: "bin/dex2oat",
            symbol: "_ZN3art15CompilerOptionsC1Ev",
            scan_words: clamp_window(scan_words),
        }
    }
}

fn clamp_window(words: usize) -> usize {
    words.clamp(1, MAX_SCAN_WORDS)
}

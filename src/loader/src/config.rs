use std::sync::OnceLock;
use zyscope_misc::props;

static INSTANCE: OnceLock<LoaderConfigs> = OnceLock::new();

const DB_PATH_PROP: &str = "persist.zyscope.db_path";
const DEFAULT_DB_PATH: &str = "/data/adb/lspd/config/modules_config.db";

#[derive(Debug)]
pub struct LoaderConfigs {
    pub db_path: String,
    pub framework_dex: &'static str,
    pub entry_class: &'static str,
}

impl LoaderConfigs {
    pub fn instance() -> &'static Self {
        INSTANCE.get_or_init(Self::from_props)
    }

    fn from_props() -> Self {
        let db_path = props::get(DB_PATH_PROP)
            .filter(|it| !it.is_empty())
            .map(|it| String::from(&*it))
            .unwrap_or_else(|| DEFAULT_DB_PATH.into());

        Self {
            db_path,
            framework_dex: "framework/lspd.dex",
            entry_class: "org.lsposed.lspd.core.Main",
        }
    }
}

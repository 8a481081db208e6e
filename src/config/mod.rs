mod settings;

pub use settings::{
    Command, Config, DaemonArgs, DaemonSettings, HyprpanelArgs, NotifySettings, QueryArgs,
    RefreshArgs, RunnerSettings, Settings,
};

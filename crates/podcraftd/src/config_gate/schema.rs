//! Recognised `server.properties` options and their value rules.

/// Value rule for one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Flag,
    Port,
    Integer { min: i64, max: i64 },
    Choice(&'static [&'static str]),
    Text,
}

/// A recognised option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OptionSpec {
    pub(crate) key: &'static str,
    kind: ValueKind,
    /// Takes effect in a running server without a restart.
    pub(crate) hot: bool,
}

const DIFFICULTIES: &[&str] = &["peaceful", "easy", "normal", "hard"];
const GAMEMODES: &[&str] = &["survival", "creative", "adventure", "spectator"];
const COMPRESSION: &[&str] = &["deflate", "lz4", "none"];
const I32_MIN: i64 = i32::MIN as i64;
const I32_MAX: i64 = i32::MAX as i64;

const fn flag(key: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        kind: ValueKind::Flag,
        hot: false,
    }
}

const fn int(key: &'static str, min: i64, max: i64) -> OptionSpec {
    OptionSpec {
        key,
        kind: ValueKind::Integer { min, max },
        hot: false,
    }
}

const fn text(key: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        kind: ValueKind::Text,
        hot: false,
    }
}

const fn port(key: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        kind: ValueKind::Port,
        hot: false,
    }
}

const OPTIONS: &[OptionSpec] = &[
    flag("accepts-transfers"),
    flag("allow-flight"),
    flag("allow-nether"),
    flag("broadcast-console-to-ops"),
    flag("broadcast-rcon-to-ops"),
    text("bug-report-link"),
    OptionSpec {
        key: "difficulty",
        kind: ValueKind::Choice(DIFFICULTIES),
        hot: true,
    },
    flag("enable-command-block"),
    flag("enable-jmx-monitoring"),
    flag("enable-query"),
    flag("enable-rcon"),
    flag("enable-status"),
    flag("enforce-secure-profile"),
    flag("enforce-whitelist"),
    int("entity-broadcast-range-percentage", 10, 1000),
    flag("force-gamemode"),
    int("function-permission-level", 1, 4),
    OptionSpec {
        key: "gamemode",
        kind: ValueKind::Choice(GAMEMODES),
        hot: false,
    },
    flag("generate-structures"),
    text("generator-settings"),
    flag("hardcore"),
    flag("hide-online-players"),
    text("initial-disabled-packs"),
    text("initial-enabled-packs"),
    text("level-name"),
    text("level-seed"),
    text("level-type"),
    flag("log-ips"),
    int("max-chained-neighbor-updates", I32_MIN, I32_MAX),
    int("max-players", 0, I32_MAX),
    int("max-tick-time", -1, i64::MAX),
    int("max-world-size", 1, 29_999_984),
    text("motd"),
    int("network-compression-threshold", -1, 65_535),
    flag("online-mode"),
    int("op-permission-level", 0, 4),
    int("player-idle-timeout", 0, I32_MAX),
    flag("prevent-proxy-connections"),
    flag("pvp"),
    port("query.port"),
    int("rate-limit", 0, I32_MAX),
    text("rcon.password"),
    port("rcon.port"),
    OptionSpec {
        key: "region-file-compression",
        kind: ValueKind::Choice(COMPRESSION),
        hot: false,
    },
    flag("require-resource-pack"),
    text("resource-pack"),
    text("resource-pack-id"),
    text("resource-pack-prompt"),
    text("resource-pack-sha1"),
    text("server-ip"),
    port("server-port"),
    int("simulation-distance", 3, 32),
    flag("spawn-animals"),
    flag("spawn-monsters"),
    flag("spawn-npcs"),
    int("spawn-protection", 0, I32_MAX),
    flag("sync-chunk-writes"),
    text("text-filtering-config"),
    flag("use-native-transport"),
    int("view-distance", 3, 32),
    OptionSpec {
        key: "white-list",
        kind: ValueKind::Flag,
        hot: true,
    },
];

/// Short names accepted in place of the file's key.
const ALIASES: &[(&str, &str)] = &[("port", "server-port"), ("whitelist", "white-list")];

/// Resolves aliases and looks up the option.
pub(crate) fn lookup(key: &str) -> Option<&'static OptionSpec> {
    let key = key.trim();
    let canonical = ALIASES
        .iter()
        .find_map(|(alias, target)| (*alias == key).then_some(*target))
        .unwrap_or(key);
    OPTIONS.iter().find(|spec| spec.key == canonical)
}

impl OptionSpec {
    /// Checks `value` and returns the form written to the file.
    pub(crate) fn normalise(&self, value: &str) -> Result<String, String> {
        if value.contains(['\n', '\r']) {
            return Err("values must fit on one line".to_owned());
        }
        let value = value.trim();
        match self.kind {
            ValueKind::Flag => match value.to_ascii_lowercase().as_str() {
                "true" => Ok("true".to_owned()),
                "false" => Ok("false".to_owned()),
                _ => Err("expected true or false".to_owned()),
            },
            ValueKind::Port => match value.parse::<u16>() {
                Ok(port) if port > 0 => Ok(port.to_string()),
                _ => Err("expected a port between 1 and 65535".to_owned()),
            },
            ValueKind::Integer { min, max } => match value.parse::<i64>() {
                Ok(number) if (min..=max).contains(&number) => Ok(number.to_string()),
                _ => Err(format!("expected an integer between {min} and {max}")),
            },
            ValueKind::Choice(choices) => {
                let lowered = value.to_ascii_lowercase();
                if choices.contains(&lowered.as_str()) {
                    Ok(lowered)
                } else {
                    Err(format!("expected one of {}", choices.join(", ")))
                }
            }
            ValueKind::Text => Ok(value.to_owned()),
        }
    }
}

use anyhow::bail;

/// Background, foreground and accent colors of a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub accent: &'static str,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    #[default]
    Radical,
    Dark,
    Light,
    GithubDark,
    GithubLight,
    Dracula,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Radical,
        Theme::Dark,
        Theme::Light,
        Theme::GithubDark,
        Theme::GithubLight,
        Theme::Dracula,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Theme::Radical => "radical",
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::GithubDark => "github_dark",
            Theme::GithubLight => "github_light",
            Theme::Dracula => "dracula",
        }
    }

    pub const fn palette(&self) -> Palette {
        match self {
            Theme::Radical => Palette {
                background: "#0b1020",
                foreground: "#ffffff",
                accent: "#ff0078",
            },
            Theme::Dark => Palette {
                background: "#0f1724",
                foreground: "#e6eef8",
                accent: "#38bdf8",
            },
            Theme::Light => Palette {
                background: "#ffffff",
                foreground: "#0f1724",
                accent: "#2563eb",
            },
            Theme::GithubDark => Palette {
                background: "#0d1117",
                foreground: "#c9d1d9",
                accent: "#238636",
            },
            Theme::GithubLight => Palette {
                background: "#ffffff",
                foreground: "#24292e",
                accent: "#0969da",
            },
            Theme::Dracula => Palette {
                background: "#282a36",
                foreground: "#f8f8f2",
                accent: "#ff79c6",
            },
        }
    }

    /// Resolve an optional theme name, falling back to the default theme for
    /// missing or unknown names.
    pub fn resolve(name: Option<&str>) -> Self {
        name.and_then(|x| x.parse().ok()).unwrap_or_default()
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Theme::ALL.iter().find(|x| x.as_str() == s) {
            Some(theme) => Ok(*theme),
            None => bail!("unknown theme: {}", s),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

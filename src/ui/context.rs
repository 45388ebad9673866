//! How much of the terminal morph may use
//!
//! Spinners and glyphs are drawn on stderr, so they depend on stderr being
//! a terminal. Confirmation prompts read stdin, so they depend on stdin.
//! Known CI runners get neither, whatever their pseudo-terminals claim.

use std::io::IsTerminal;

const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

#[derive(Debug, Clone)]
pub struct UiContext {
    progress: bool,
    prompt: bool,
    auto_yes: bool,
}

impl UiContext {
    pub fn detect() -> Self {
        let ci = CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            progress: !ci && std::io::stderr().is_terminal(),
            prompt: !ci && std::io::stdin().is_terminal(),
            auto_yes: false,
        }
    }

    /// No spinners and no prompts
    pub fn plain() -> Self {
        Self {
            progress: false,
            prompt: false,
            auto_yes: false,
        }
    }

    /// Treat every confirmation as answered yes (`--yes`)
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Whether a question on stdin can be answered
    pub fn can_prompt(&self) -> bool {
        self.prompt
    }

    /// Whether to draw spinners and glyphs instead of tagged lines
    pub fn show_progress(&self) -> bool {
        self.progress
    }
}

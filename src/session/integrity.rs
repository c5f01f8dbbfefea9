// src/session/integrity.rs

use serde::{Deserialize, Serialize};

/// Clipboard action reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// A key press with its modifiers, as reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            shift: true,
            ..Self::default()
        }
    }

    /// Developer-tool shortcuts: F12, Ctrl+Shift+I/J/C, Ctrl+U and their
    /// Cmd+Option / Cmd counterparts.
    pub fn is_devtools_shortcut(&self) -> bool {
        let key = self.key.to_ascii_uppercase();
        if key == "F12" {
            return true;
        }
        let inspector = matches!(key.as_str(), "I" | "J" | "C");
        let view_source = key == "U";

        (self.ctrl && self.shift && inspector)
            || (self.meta && self.alt && inspector)
            || (self.ctrl && !self.shift && view_source)
            || (self.meta && !self.shift && view_source)
    }
}

/// Environment signal observed while the exam is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    VisibilityHidden,
    VisibilityVisible,
    FullscreenExited,
    FullscreenEntered,
    Key(KeyCombo),
    Clipboard { action: ClipboardAction },
}

impl Signal {
    /// Whether the page must suppress the browser's default action.
    /// Clipboard actions and devtools shortcuts are always blocked, whatever
    /// the phase or strike count.
    pub fn blocks_default(&self) -> bool {
        match self {
            Signal::Key(combo) => combo.is_devtools_shortcut(),
            Signal::Clipboard { .. } => true,
            _ => false,
        }
    }
}

/// Escalation level for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationState {
    #[default]
    Clear,
    Warned,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not a violation, or the monitor is not listening.
    Ignored,
    /// First strike: show the blocking warning.
    Warning,
    /// Second strike: submit now.
    Terminate,
}

/// How the page must react to one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub verdict: Verdict,
    /// Suppress the browser's default action (clipboard, devtools keys).
    pub block_default: bool,
}

/// Two-strike monitor. Every kind of violation shares one counter.
#[derive(Debug, Default)]
pub struct IntegrityMonitor {
    state: ViolationState,
    active: bool,
    warning_pending: bool,
}

impl IntegrityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if !self.active {
            tracing::debug!("Integrity monitor listening");
        }
        self.active = true;
    }

    pub fn stop(&mut self) {
        if self.active {
            tracing::debug!("Integrity monitor stopped");
        }
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> ViolationState {
        self.state
    }

    /// Whether the blocking warning is waiting for acknowledgment.
    pub fn warning_pending(&self) -> bool {
        self.warning_pending
    }

    pub fn acknowledge_warning(&mut self) {
        self.warning_pending = false;
    }

    pub fn observe(&mut self, signal: &Signal) -> Assessment {
        let block_default = signal.blocks_default();
        let violation = match signal {
            Signal::VisibilityHidden | Signal::FullscreenExited => true,
            Signal::Key(_) | Signal::Clipboard { .. } => block_default,
            Signal::FullscreenEntered => {
                // Re-entering fullscreen is how the warning is acknowledged.
                if self.active && self.state == ViolationState::Warned {
                    self.warning_pending = false;
                }
                false
            }
            Signal::VisibilityVisible => false,
        };

        let verdict = if violation && self.active {
            self.escalate()
        } else {
            Verdict::Ignored
        };

        Assessment {
            verdict,
            block_default,
        }
    }

    fn escalate(&mut self) -> Verdict {
        match self.state {
            ViolationState::Clear => {
                self.state = ViolationState::Warned;
                self.warning_pending = true;
                Verdict::Warning
            }
            ViolationState::Warned => {
                self.state = ViolationState::Terminal;
                self.warning_pending = false;
                self.active = false;
                Verdict::Terminate
            }
            ViolationState::Terminal => Verdict::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening() -> IntegrityMonitor {
        let mut monitor = IntegrityMonitor::new();
        monitor.start();
        monitor
    }

    #[test]
    fn test_hidden_then_devtools_terminates_once() {
        let mut monitor = listening();

        let first = monitor.observe(&Signal::VisibilityHidden);
        assert_eq!(first.verdict, Verdict::Warning);
        assert_eq!(monitor.state(), ViolationState::Warned);
        assert!(monitor.warning_pending());

        let second = monitor.observe(&Signal::Key(KeyCombo::plain("F12")));
        assert_eq!(second.verdict, Verdict::Terminate);
        assert!(second.block_default);
        assert_eq!(monitor.state(), ViolationState::Terminal);

        let third = monitor.observe(&Signal::FullscreenExited);
        assert_eq!(third.verdict, Verdict::Ignored);
    }

    #[test]
    fn test_clipboard_is_blocked_and_counted() {
        let mut monitor = listening();
        let assessment = monitor.observe(&Signal::Clipboard {
            action: ClipboardAction::Paste,
        });
        assert!(assessment.block_default);
        assert_eq!(assessment.verdict, Verdict::Warning);
    }

    #[test]
    fn test_clipboard_blocked_even_when_stopped() {
        let mut monitor = IntegrityMonitor::new();
        let assessment = monitor.observe(&Signal::Clipboard {
            action: ClipboardAction::Copy,
        });
        assert!(assessment.block_default);
        assert_eq!(assessment.verdict, Verdict::Ignored);
        assert_eq!(monitor.state(), ViolationState::Clear);
    }

    #[test]
    fn test_block_decision_is_independent_of_state() {
        assert!(Signal::Clipboard { action: ClipboardAction::Paste }.blocks_default());
        assert!(Signal::Key(KeyCombo::ctrl("U")).blocks_default());
        assert!(!Signal::Key(KeyCombo::plain("a")).blocks_default());
        assert!(!Signal::VisibilityHidden.blocks_default());
        assert!(!Signal::FullscreenExited.blocks_default());
    }

    #[test]
    fn test_ordinary_keys_are_ignored() {
        let mut monitor = listening();
        for combo in [KeyCombo::plain("a"), KeyCombo::ctrl("c"), KeyCombo::ctrl_shift("x")] {
            let assessment = monitor.observe(&Signal::Key(combo));
            assert_eq!(assessment.verdict, Verdict::Ignored);
            assert!(!assessment.block_default);
        }
        assert_eq!(monitor.state(), ViolationState::Clear);
    }

    #[test]
    fn test_devtools_denylist() {
        assert!(KeyCombo::plain("F12").is_devtools_shortcut());
        assert!(KeyCombo::ctrl_shift("i").is_devtools_shortcut());
        assert!(KeyCombo::ctrl_shift("J").is_devtools_shortcut());
        assert!(KeyCombo::ctrl_shift("C").is_devtools_shortcut());
        assert!(KeyCombo::ctrl("u").is_devtools_shortcut());
        let mac_inspector = KeyCombo {
            key: "I".to_string(),
            meta: true,
            alt: true,
            ..KeyCombo::default()
        };
        assert!(mac_inspector.is_devtools_shortcut());
        assert!(!KeyCombo::plain("i").is_devtools_shortcut());
    }

    #[test]
    fn test_fullscreen_reentry_acknowledges_warning() {
        let mut monitor = listening();
        monitor.observe(&Signal::FullscreenExited);
        assert!(monitor.warning_pending());
        monitor.observe(&Signal::FullscreenEntered);
        assert!(!monitor.warning_pending());
        assert_eq!(monitor.state(), ViolationState::Warned);
    }

    #[test]
    fn test_stopped_monitor_ignores_violations() {
        let mut monitor = listening();
        monitor.stop();
        let assessment = monitor.observe(&Signal::VisibilityHidden);
        assert_eq!(assessment.verdict, Verdict::Ignored);
        assert_eq!(monitor.state(), ViolationState::Clear);
    }

    #[test]
    fn test_signal_wire_format() {
        let signal: Signal = serde_json::from_str(r#"{"kind":"key","key":"I","ctrl":true,"shift":true}"#).unwrap();
        assert_eq!(signal, Signal::Key(KeyCombo::ctrl_shift("I")));
        let signal: Signal = serde_json::from_str(r#"{"kind":"clipboard","action":"cut"}"#).unwrap();
        assert_eq!(signal, Signal::Clipboard { action: ClipboardAction::Cut });
    }
}

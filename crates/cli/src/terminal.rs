// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokenward::events::{Navigator, Notifier};

/// Prints session notices to stderr.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// A terminal has no login screen; point the user at the login command.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn to_login(&self) {
        eprintln!("run `tokenward login` to sign in");
    }
}

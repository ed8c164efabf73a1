// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation plumbing.
//!
//! Every engine operation accepts a [`CancelToken`]; cancellation
//! propagates down to in-flight agent calls. Tokens are cheap clones of
//! a watch receiver; [`CancelToken::none`] never fires.

use tokio::sync::watch;

/// Sender half; cancels all tokens cloned from its pair.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half; observed by long-running operations.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that can never be canceled.
    pub fn none() -> Self {
        Self { rx: None }
    }

    pub fn is_canceled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve when the token is canceled; pending forever for
    /// [`CancelToken::none`].
    pub async fn canceled(&self) {
        match &self.rx {
            None => std::future::pending().await,
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                loop {
                    if rx.changed().await.is_err() {
                        // Source dropped without canceling
                        std::future::pending::<()>().await;
                    }
                    if *rx.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

/// Create a linked source/token pair.
pub fn cancel_pair() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx: Some(rx) })
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;

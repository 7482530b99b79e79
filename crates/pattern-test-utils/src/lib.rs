//! Testing utilities for the pattern workspace
//!
//! Shared fixtures and fake mutation capabilities.

#![allow(missing_docs)]

use async_trait::async_trait;
use pattern_model::{ChordSection, DrumSection, MelodySection, PatternDocument, TimeInterval, Waveform};
use pattern_queue::{MutationCapability, MutationError, PatternConfig, PatternService};
use pattern_store::PatternStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Valid document at 30 bpm with drums
pub fn sample_document() -> PatternDocument {
    PatternDocument {
        bpm: 30,
        chords: ChordSection {
            progression: vec![
                vec!["C3".into(), "E3".into(), "G3".into()],
                vec!["A2".into(), "C3".into(), "E3".into()],
                vec!["F2".into(), "A2".into(), "C3".into()],
            ],
            interval: TimeInterval::TwoMeasures,
            duration: TimeInterval::TwoMeasures,
            filter: 400,
        },
        melody: MelodySection {
            notes: vec!["~".into(), "E4".into(), "~".into(), "G4".into()],
            interval: TimeInterval::EighthNote,
            duration: TimeInterval::EighthNote,
            waveform: Waveform::Sine,
            delay: 0.35,
        },
        drums: Some(DrumSection {
            kick: vec![1, 0, 0, 0, 1, 0, 0, 0],
            snare: vec![0, 0, 1, 0, 0, 0, 1, 0],
            hihat: None,
            interval: TimeInterval::OneMeasure,
        }),
    }
}

/// Hand-written pattern file text in the permissive layout
pub fn sample_text() -> &'static str {
    "// Ambient pattern\n\
     // TIMESTAMP: 2025-11-24 @ 05:56:30\n\
     \n\
     ({\n\
     \x20   bpm: 30,\n\
     \x20   chords: {\n\
     \x20       progression: [['C3', 'E3', 'G3'], ['A2', 'C3', 'E3'], ['F2', 'A2', 'C3']],\n\
     \x20       interval: '2m', duration: '2m', filter: 400,\n\
     \x20   },\n\
     \x20   melody: {\n\
     \x20       notes: ['~', 'E4', '~', 'G4'],\n\
     \x20       interval: '8n', duration: '8n', waveform: 'sine', delay: 0.35,\n\
     \x20   },\n\
     \x20   drums: {\n\
     \x20       kick: [1, 0, 0, 0, 1, 0, 0, 0],\n\
     \x20       snare: [0, 0, 1, 0, 0, 0, 1, 0],\n\
     \x20       interval: '1m',\n\
     \x20   },\n\
     });\n"
}

/// Pattern file in a temporary directory, removed on drop
pub struct TempPattern {
    pub dir: TempDir,
    pub store: Arc<PatternStore>,
}

impl TempPattern {
    /// Directory holding the sample document, written through the store
    pub fn new() -> Self {
        let pattern = Self::empty();
        pattern
            .store
            .write(&sample_document(), "Initial pattern")
            .unwrap();
        pattern
    }

    /// Directory holding `text` verbatim
    pub fn with_text(text: &str) -> Self {
        let pattern = Self::empty();
        std::fs::write(pattern.store.path(), text).unwrap();
        pattern
    }

    /// Directory without a pattern file
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(PatternStore::new(dir.path().join("patterns.js")));
        Self { dir, store }
    }

    /// Fast-ticking configuration pointing at this file
    pub fn config(&self) -> PatternConfig {
        PatternConfig::new()
            .with_pattern_path(self.store.path())
            .with_tick_interval_ms(20)
            .with_fallback_timeout_secs(1)
    }

    /// Service over this file
    pub fn service(&self) -> PatternService {
        PatternService::new(self.config())
    }

    /// Service over this file with a capability
    pub fn service_with(&self, capability: Arc<dyn MutationCapability>) -> PatternService {
        PatternService::with_capability(self.config(), capability)
    }

    /// Raw bytes of the live file
    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(self.store.path()).unwrap()
    }
}

impl Default for TempPattern {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability returning the current document with a new tempo, counting calls
#[derive(Debug)]
pub struct CountingCapability {
    bpm: i64,
    calls: AtomicUsize,
}

impl CountingCapability {
    pub fn new(bpm: i64) -> Arc<Self> {
        Arc::new(Self {
            bpm,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MutationCapability for CountingCapability {
    async fn propose(
        &self,
        _description: &str,
        current: &PatternDocument,
    ) -> Result<PatternDocument, MutationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PatternDocument {
            bpm: self.bpm,
            ..current.clone()
        })
    }
}

/// Capability that always fails
#[derive(Debug, Default)]
pub struct FailingCapability;

#[async_trait]
impl MutationCapability for FailingCapability {
    async fn propose(
        &self,
        description: &str,
        _current: &PatternDocument,
    ) -> Result<PatternDocument, MutationError> {
        Err(MutationError::Failed(format!("cannot apply '{description}'")))
    }
}

/// Capability that never answers
#[derive(Debug, Default)]
pub struct HangingCapability;

#[async_trait]
impl MutationCapability for HangingCapability {
    async fn propose(
        &self,
        _description: &str,
        _current: &PatternDocument,
    ) -> Result<PatternDocument, MutationError> {
        std::future::pending().await
    }
}

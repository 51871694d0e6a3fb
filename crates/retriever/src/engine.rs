//! Engine and session: the retrieval state machine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use canonical::{
    canonicalize, context_fragment, element_fragment, frame_identity, Descriptor, Digest160,
    RawSnapshot, Snapshot, VolatileMatcher,
};
use embed::{
    with_deadline, CancelToken, ElementEmbedder, EmbeddingCache, ProviderError, QueryEmbedder,
    Reranker,
};
use findex::{DeltaPlan, IndexEntry, IndexMode, SessionIndexes};
use intent::Intent;
use matcher::{action_filter, heuristic_score, lexical_score, rank, AxisScores, Candidate,
    ScoredItem};
use promotion::{PromotionKey, PromotionStore};
use synth::{synthesize, Strategy};

use crate::config::EngineConfig;
use crate::error::RetrieveError;
use crate::metrics::metrics_recorder;
use crate::result::{DegradedReason, NearMiss, RetrieveResult, Status};

/// Penalty applied to a winner whose selector could not be verified before
/// the single re-selection retry.
const RESELECT_PENALTY: f32 = 0.5;

/// Process-shared retrieval state: providers, caches, stores, configs.
///
/// One engine serves many parallel sessions; everything mutable inside it
/// is governed by the locking discipline of its member crates. Sessions
/// own their per-frame indexes, so queries never contend on index state.
pub struct Engine {
    config: EngineConfig,
    cache: EmbeddingCache,
    promotions: PromotionStore,
    volatile: VolatileMatcher,
    query_embedder: Arc<dyn QueryEmbedder>,
    element_embedder: Arc<dyn ElementEmbedder>,
    reranker: Arc<dyn Reranker>,
}

impl Engine {
    /// Build an engine. Fatal on configuration errors, including a query /
    /// element dimension mismatch (the shortlist compares them directly).
    pub fn new(
        config: EngineConfig,
        query_embedder: Arc<dyn QueryEmbedder>,
        element_embedder: Arc<dyn ElementEmbedder>,
        reranker: Arc<dyn Reranker>,
    ) -> Result<Arc<Self>, RetrieveError> {
        config.validate()?;
        if query_embedder.dim() != element_embedder.dim() {
            return Err(RetrieveError::Config(format!(
                "query dim {} != element dim {}; first-stage cosine needs one space",
                query_embedder.dim(),
                element_embedder.dim()
            )));
        }
        let volatile = VolatileMatcher::new(&config.canonical.volatile_patterns)
            .map_err(|e| RetrieveError::Config(e.to_string()))?;
        let cache = EmbeddingCache::new(&config.cache)
            .map_err(|e| RetrieveError::Config(e.to_string()))?;
        let promotions = match &config.promotion_path {
            Some(path) => PromotionStore::open(path, config.promotion_row_budget),
            None => PromotionStore::in_memory(config.promotion_row_budget),
        }
        .map_err(|e| RetrieveError::Config(e.to_string()))?;

        Ok(Arc::new(Self {
            config,
            cache,
            promotions,
            volatile,
            query_embedder,
            element_embedder,
            reranker,
        }))
    }

    /// Open a session against this engine.
    pub fn session(self: &Arc<Self>) -> Session {
        Session {
            engine: self.clone(),
            indexes: SessionIndexes::new(self.element_embedder.dim(), self.config.index),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Feedback from the action executor. Promotion-store write errors are
    /// recoverable and only logged; feedback must never fail the caller.
    pub fn report_outcome(
        &self,
        page_signature: Digest160,
        frame_hash: Digest160,
        label_key: Digest160,
        xpath: &str,
        success: bool,
    ) {
        let key = PromotionKey {
            page_signature,
            frame_hash,
            label_key,
        };
        let strategy = Strategy::classify(xpath);
        let outcome = if success {
            self.promotions.record_success(&key, xpath, strategy)
        } else {
            self.promotions.record_failure(&key, xpath, strategy)
        };
        if let Err(e) = outcome {
            warn!(error = %e, %xpath, "promotion feedback dropped");
        }
    }
}

/// One frame of the current snapshot, under both of its identities: the
/// skeleton-sensitive `hash` (promotion scoping, §6.3 schema) and the
/// path-stable `identity` (index reuse across snapshots).
#[derive(Clone, Copy)]
struct FrameRef {
    hash: Digest160,
    identity: Digest160,
}

/// What the promotion pass decided before fusion.
enum PromotionPass {
    /// A stored winner still uniquely resolves: return it immediately.
    ShortCircuit(RetrieveResult),
    /// Boosts for candidates covered by a multi-matching stored winner.
    Boosts(HashMap<u64, f32>),
}

/// One session: single query in flight, owns its frame indexes.
pub struct Session {
    engine: Arc<Engine>,
    indexes: SessionIndexes,
}

impl Session {
    /// Run one retrieval through the state machine.
    pub async fn retrieve(
        &mut self,
        intent: &Intent,
        raw: &RawSnapshot,
        cancel: &CancelToken,
    ) -> Result<RetrieveResult, RetrieveError> {
        let start = Instant::now();
        if !intent.action.targets_element() {
            return Err(RetrieveError::NonElementAction(intent.action.as_str()));
        }

        // Canonicalizing.
        let snapshot = canonicalize(raw, &self.engine.config.canonical)?;
        self.check_cancel(cancel)?;

        let mut degraded: Vec<DegradedReason> = Vec::new();
        let frames: Vec<FrameRef> = snapshot
            .frame_hashes()
            .into_iter()
            .map(|hash| {
                let identity = snapshot
                    .frame_members(hash)
                    .first()
                    .map(|d| frame_identity(&d.frame_path))
                    .unwrap_or_default();
                FrameRef { hash, identity }
            })
            .collect();

        // Promotion lookup runs before any model work.
        let boosts = match self.promotion_pass(intent, &snapshot, &frames, &mut degraded) {
            PromotionPass::ShortCircuit(result) => {
                return Ok(self.finish(result, Vec::new(), start));
            }
            PromotionPass::Boosts(boosts) => boosts,
        };

        // Indexing: plan reuse per frame, embed only what the plans need.
        let plans: Vec<(Digest160, DeltaPlan, Vec<IndexEntry>)> = frames
            .iter()
            .map(|frame| {
                let entries: Vec<IndexEntry> = snapshot
                    .frame_members(frame.hash)
                    .iter()
                    .map(|d| IndexEntry {
                        backend_id: d.backend_id,
                        content_hash: d.content_hash,
                        doc_order: snapshot.doc_order(d.backend_id).unwrap_or(usize::MAX),
                    })
                    .collect();
                let plan = self.indexes.plan(frame.identity, &entries);
                (frame.identity, plan, entries)
            })
            .collect();
        let mode = aggregate_mode(plans.iter().map(|(_, plan, _)| plan.mode));

        if intent.target.trim().is_empty() {
            // Never hallucinate a selection for an empty target.
            let result = RetrieveResult::miss(Status::ElementNotFound, mode, Vec::new(), degraded);
            return Ok(self.finish(result, Vec::new(), start));
        }

        let mut pending_puts: Vec<(Digest160, Vec<f32>)> = Vec::new();
        self.index_frames(&snapshot, &plans, &mut pending_puts, &mut degraded, cancel)
            .await?;
        self.check_cancel(cancel)?;

        // Matching.
        let filtered: Vec<&Descriptor> = snapshot
            .descriptors
            .iter()
            .filter(|d| action_filter(intent.action, d))
            .collect();

        let lexical: HashMap<u64, matcher::LexicalHit> = filtered
            .iter()
            .map(|d| (d.backend_id, lexical_score(&intent.target, d)))
            .collect();
        let exact_ids: Vec<u64> = lexical
            .iter()
            .filter(|(_, hit)| hit.exact)
            .map(|(&id, _)| id)
            .collect();
        let skip_semantic = exact_ids.len() == 1;
        if skip_semantic {
            debug!(backend_id = exact_ids[0], "exact-match short path, semantic stage skipped");
        }

        let semantic = if skip_semantic {
            HashMap::new()
        } else {
            self.semantic_scores(intent, &snapshot, &frames, &mut degraded, cancel)
                .await?
        };

        let items: Vec<ScoredItem> = filtered
            .iter()
            .map(|d| {
                let (heuristic, reasons) =
                    heuristic_score(intent, d, &snapshot, &self.engine.volatile);
                let hit = lexical[&d.backend_id];
                ScoredItem {
                    backend_id: d.backend_id,
                    axes: AxisScores {
                        semantic: semantic.get(&d.backend_id).copied().unwrap_or(0.0),
                        lexical: hit.score,
                        heuristic,
                        promotion: boosts.get(&d.backend_id).copied().unwrap_or(0.0),
                    },
                    reasons: reasons.iter().map(|r| r.to_string()).collect(),
                    doc_order: snapshot.doc_order(d.backend_id).unwrap_or(usize::MAX),
                    frame_depth: d.frame_depth(),
                }
            })
            .collect();
        let mut ranked = rank(&self.engine.config.matching, items);
        self.check_cancel(cancel)?;

        // Synthesizing / Verifying, with one re-selection retry.
        let tau = self.engine.config.matching.tau;
        let mut retried = false;
        loop {
            let Some(winner) = ranked.first().filter(|c| c.fused >= tau).cloned() else {
                let near = self.near_misses(&snapshot, &ranked, 0);
                let status = Status::ElementNotFound;
                let result = RetrieveResult::miss(status, mode, near, degraded);
                return Ok(self.finish(result, pending_puts, start));
            };
            match synthesize(&snapshot, winner.backend_id, &self.engine.volatile) {
                Ok(synthesized) => {
                    let descriptor = snapshot
                        .get(winner.backend_id)
                        .expect("winner came from this snapshot");
                    self.sync_cache_flag(&mut degraded);
                    let status = if degraded.is_empty() {
                        Status::Success
                    } else {
                        Status::Degraded
                    };
                    let near = self.near_misses(&snapshot, &ranked, 1);
                    info!(
                        xpath = %synthesized.xpath,
                        strategy = synthesized.strategy.as_str(),
                        confidence = winner.fused,
                        "selector retrieved"
                    );
                    let result = RetrieveResult {
                        status,
                        xpath: synthesized.xpath,
                        confidence: winner.fused,
                        strategy: synthesized.strategy.as_str().to_string(),
                        frame_path: descriptor.frame_path.clone(),
                        near_misses: near,
                        mode,
                        degraded_reasons: degraded,
                    };
                    return Ok(self.finish(result, pending_puts, start));
                }
                Err(e) if !retried => {
                    // Verifying → Matching, once: demote the unverifiable
                    // winner and re-select.
                    debug!(backend_id = winner.backend_id, error = %e, "re-selecting after synthesis failure");
                    retried = true;
                    if let Some(first) = ranked.first_mut() {
                        first.fused = (first.fused - RESELECT_PENALTY).max(0.0);
                    }
                    ranked.sort_by(|a, b| {
                        b.fused
                            .partial_cmp(&a.fused)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(a.doc_order.cmp(&b.doc_order))
                            .then(a.frame_depth.cmp(&b.frame_depth))
                    });
                }
                Err(_) => {
                    let near = self.near_misses(&snapshot, &ranked, 0);
                    let result =
                        RetrieveResult::miss(Status::SynthesisFailed, mode, near, degraded);
                    return Ok(self.finish(result, pending_puts, start));
                }
            }
        }
    }

    /// Feedback passthrough; see [`Engine::report_outcome`].
    pub fn report_outcome(
        &self,
        page_signature: Digest160,
        frame_hash: Digest160,
        label_key: Digest160,
        xpath: &str,
        success: bool,
    ) {
        self.engine
            .report_outcome(page_signature, frame_hash, label_key, xpath, success);
    }

    fn check_cancel(&self, cancel: &CancelToken) -> Result<(), RetrieveError> {
        if cancel.is_cancelled() {
            Err(RetrieveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Look up stored winners for every frame. A unique resolve wins
    /// outright; a stale winner is demoted and the pipeline proceeds.
    fn promotion_pass(
        &self,
        intent: &Intent,
        snapshot: &Snapshot,
        frames: &[FrameRef],
        degraded: &mut Vec<DegradedReason>,
    ) -> PromotionPass {
        let mut boosts = HashMap::new();
        for frame in frames {
            let frame = frame.hash;
            let key = PromotionKey {
                page_signature: snapshot.page_signature,
                frame_hash: frame,
                label_key: intent.label_key,
            };
            let row = match self.engine.promotions.lookup(&key) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "promotion lookup failed");
                    push_unique(degraded, DegradedReason::PromotionStoreUnavailable);
                    continue;
                }
            };
            if row.demoted {
                continue;
            }
            let resolved =
                synth::evaluate(&row.xpath, snapshot, Some(frame)).unwrap_or_default();
            match resolved.as_slice() {
                [] => {
                    // Stored winner no longer resolves on this page state.
                    if let Err(e) = self.engine.promotions.demote(&key) {
                        warn!(error = %e, "promotion demotion failed");
                        push_unique(degraded, DegradedReason::PromotionStoreUnavailable);
                    }
                }
                [only] => {
                    let descriptor = snapshot.get(*only);
                    info!(xpath = %row.xpath, "promotion short-circuit");
                    self.sync_cache_flag(degraded);
                    let status = if degraded.is_empty() {
                        Status::Success
                    } else {
                        Status::Degraded
                    };
                    return PromotionPass::ShortCircuit(RetrieveResult {
                        status,
                        xpath: row.xpath.clone(),
                        confidence: row.boost(),
                        strategy: Strategy::Promoted.as_str().to_string(),
                        frame_path: descriptor
                            .map(|d| d.frame_path.clone())
                            .unwrap_or_default(),
                        near_misses: Vec::new(),
                        mode: IndexMode::Warm,
                        degraded_reasons: degraded.clone(),
                    });
                }
                many => {
                    for &id in many {
                        boosts.insert(id, row.boost());
                    }
                }
            }
        }
        PromotionPass::Boosts(boosts)
    }

    /// Fetch or compute element vectors per the plans, then apply them.
    async fn index_frames(
        &mut self,
        snapshot: &Snapshot,
        plans: &[(Digest160, DeltaPlan, Vec<IndexEntry>)],
        pending_puts: &mut Vec<(Digest160, Vec<f32>)>,
        degraded: &mut Vec<DegradedReason>,
        cancel: &CancelToken,
    ) -> Result<(), RetrieveError> {
        let model = self.engine.element_embedder.model_id().to_string();
        let dim = self.engine.element_embedder.dim();
        let mut embedding_lost = false;

        for (frame, plan, entries) in plans.iter() {
            if plan.to_embed.is_empty() && plan.to_remove.is_empty() && plan.mode == IndexMode::Warm
            {
                // Still refresh document order on warm frames.
                self.indexes
                    .apply(*frame, plan, entries, &[])
                    .map_err(|e| RetrieveError::Config(e.to_string()))?;
                continue;
            }

            let hashes: Vec<Digest160> =
                plan.to_embed.iter().map(|e| e.content_hash).collect();
            let mut have = self.engine.cache.get_many(&model, dim, &hashes);
            self.sync_cache_flag(degraded);

            let missing: Vec<IndexEntry> = plan
                .to_embed
                .iter()
                .filter(|e| !have.contains_key(&e.content_hash))
                .copied()
                .collect();

            if !missing.is_empty() && !embedding_lost {
                let batch_cap = self.engine.element_embedder.max_batch().max(1);
                for chunk in missing.chunks(batch_cap) {
                    let fragments: Vec<String> = chunk
                        .iter()
                        .filter_map(|e| snapshot.get(e.backend_id))
                        .map(element_fragment)
                        .collect();
                    let embedder = self.engine.element_embedder.clone();
                    let outcome = with_deadline(
                        self.engine.config.providers.embed_timeout_ms,
                        cancel,
                        async move { embedder.embed_batch(&fragments).await },
                    )
                    .await;
                    match outcome {
                        Ok(vectors) => {
                            for (entry, vector) in chunk.iter().zip(vectors) {
                                if vector.len() != dim {
                                    continue;
                                }
                                have.insert(entry.content_hash, Arc::new(vector.clone()));
                                pending_puts.push((entry.content_hash, vector));
                            }
                        }
                        Err(ProviderError::Cancelled) => return Err(RetrieveError::Cancelled),
                        Err(e) => {
                            warn!(error = %e, "element embedding degraded");
                            push_unique(degraded, DegradedReason::EmbeddingTimeout);
                            embedding_lost = true;
                            break;
                        }
                    }
                }
            }

            // Entries without vectors (lost to degradation) drop out of
            // this application; they simply stay unscored semantically.
            let covered: Vec<IndexEntry> = plan
                .to_embed
                .iter()
                .filter(|e| have.contains_key(&e.content_hash))
                .copied()
                .collect();
            let vectors: Vec<Arc<Vec<f32>>> = covered
                .iter()
                .map(|e| have[&e.content_hash].clone())
                .collect();
            let applied = DeltaPlan {
                mode: plan.mode,
                to_embed: covered,
                to_remove: plan.to_remove.clone(),
                rebuild: plan.rebuild,
            };
            self.indexes
                .apply(*frame, &applied, entries, &vectors)
                .map_err(|e| RetrieveError::Config(e.to_string()))?;
        }
        Ok(())
    }

    /// Query embedding, shortlist, and re-rank: the semantic axis.
    async fn semantic_scores(
        &self,
        intent: &Intent,
        snapshot: &Snapshot,
        frames: &[FrameRef],
        degraded: &mut Vec<DegradedReason>,
        cancel: &CancelToken,
    ) -> Result<HashMap<u64, f32>, RetrieveError> {
        let mut scores = HashMap::new();

        let target = intent.target.clone();
        let embedder = self.engine.query_embedder.clone();
        let query_vector = match with_deadline(
            self.engine.config.providers.embed_timeout_ms,
            cancel,
            async move { embedder.embed_query(&target).await },
        )
        .await
        {
            Ok(vector) => vector,
            Err(ProviderError::Cancelled) => return Err(RetrieveError::Cancelled),
            Err(e) => {
                warn!(error = %e, "query embedding degraded, semantic axis zeroed");
                push_unique(degraded, DegradedReason::EmbeddingTimeout);
                return Ok(scores);
            }
        };

        // Shortlist across every frame index, re-sorted globally.
        let top_k = self.engine.config.matching.top_k;
        let mut shortlist: Vec<(u64, f32)> = Vec::new();
        for frame in frames {
            if let Some(index) = self.indexes.frame(frame.identity) {
                if let Ok(hits) = index.search(&query_vector, top_k) {
                    shortlist.extend(hits.into_iter().map(|h| (h.backend_id, h.score)));
                }
            }
        }
        shortlist.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    snapshot
                        .doc_order(a.0)
                        .cmp(&snapshot.doc_order(b.0))
                })
        });
        shortlist.truncate(top_k);

        // First-stage scores stand in until (unless) the re-ranker speaks.
        for &(id, cosine) in &shortlist {
            scores.insert(id, cosine);
        }

        for &(id, _) in &shortlist {
            let Some(descriptor) = snapshot.get(id) else {
                continue;
            };
            let fragment =
                context_fragment(snapshot, descriptor, self.engine.config.canonical.context_cap);
            let query = intent.target.clone();
            let reranker = self.engine.reranker.clone();
            let outcome = with_deadline(
                self.engine.config.providers.rerank_timeout_ms,
                cancel,
                async move { reranker.score(&query, &fragment).await },
            )
            .await;
            match outcome {
                Ok(score) => {
                    scores.insert(id, score.clamp(0.0, 1.0));
                }
                Err(ProviderError::Cancelled) => return Err(RetrieveError::Cancelled),
                Err(e) => {
                    // Shortlist order from the first stage stands.
                    warn!(error = %e, "re-ranker degraded, keeping shortlist scores");
                    push_unique(degraded, DegradedReason::RerankTimeout);
                    break;
                }
            }
        }
        Ok(scores)
    }

    /// Best-effort runner-up diagnostics.
    fn near_misses(
        &self,
        snapshot: &Snapshot,
        ranked: &[Candidate],
        skip: usize,
    ) -> Vec<NearMiss> {
        ranked
            .iter()
            .skip(skip)
            .take(self.engine.config.matching.near_misses)
            .map(|candidate| {
                let xpath = synthesize(snapshot, candidate.backend_id, &self.engine.volatile)
                    .map(|s| s.xpath)
                    .unwrap_or_default();
                NearMiss {
                    xpath,
                    confidence: candidate.fused,
                    reasons: candidate.reasons.clone(),
                }
            })
            .collect()
    }

    /// Reporting: flush buffered cold-tier writes, record metrics.
    fn finish(
        &self,
        result: RetrieveResult,
        pending_puts: Vec<(Digest160, Vec<f32>)>,
        start: Instant,
    ) -> RetrieveResult {
        if !pending_puts.is_empty() {
            self.engine.cache.put_many(
                self.engine.element_embedder.model_id(),
                self.engine.element_embedder.dim(),
                pending_puts,
            );
        }
        if let Some(recorder) = metrics_recorder() {
            recorder.record_retrieve(
                result.status.as_str(),
                result.mode.as_str(),
                start.elapsed(),
            );
        }
        debug!(
            status = result.status.as_str(),
            mode = result.mode.as_str(),
            "retrieval finished"
        );
        result
    }

    fn sync_cache_flag(&self, degraded: &mut Vec<DegradedReason>) {
        if self.engine.cache.degraded() {
            push_unique(degraded, DegradedReason::CacheDiskUnavailable);
        }
    }
}

fn aggregate_mode(modes: impl Iterator<Item = IndexMode>) -> IndexMode {
    let mut aggregate = IndexMode::Warm;
    for mode in modes {
        match mode {
            IndexMode::Cold => return IndexMode::Cold,
            IndexMode::Delta => aggregate = IndexMode::Delta,
            IndexMode::Warm => {}
        }
    }
    aggregate
}

fn push_unique(reasons: &mut Vec<DegradedReason>, reason: DegradedReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_aggregation_prefers_cold_then_delta() {
        assert_eq!(
            aggregate_mode([IndexMode::Warm, IndexMode::Warm].into_iter()),
            IndexMode::Warm
        );
        assert_eq!(
            aggregate_mode([IndexMode::Warm, IndexMode::Delta].into_iter()),
            IndexMode::Delta
        );
        assert_eq!(
            aggregate_mode([IndexMode::Delta, IndexMode::Cold].into_iter()),
            IndexMode::Cold
        );
        assert_eq!(aggregate_mode(std::iter::empty()), IndexMode::Warm);
    }

    #[test]
    fn degraded_reasons_deduplicate() {
        let mut reasons = Vec::new();
        push_unique(&mut reasons, DegradedReason::EmbeddingTimeout);
        push_unique(&mut reasons, DegradedReason::EmbeddingTimeout);
        push_unique(&mut reasons, DegradedReason::RerankTimeout);
        assert_eq!(
            reasons,
            vec![
                DegradedReason::EmbeddingTimeout,
                DegradedReason::RerankTimeout
            ]
        );
    }
}

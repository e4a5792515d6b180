//! Review-gated splitting of paragraph-level passages
//!
//! Chinese clause punctuation does not reliably line up with English
//! sentence boundaries, so splitting is never applied on heuristics alone:
//!
//! 1. [`Splitter::propose_chapter`] builds a [`SplitPlan`] of candidate
//!    splits, every proposal unaccepted.
//! 2. An operator reviews the plan file, corrects parts where the alignment
//!    is wrong, drops proposals they reject, and sets `accepted: true`.
//! 3. [`Splitter::apply_plan`] checks that each accepted split reconstructs
//!    its original paragraph, replaces the passages and renumbers the chapter.
//!
//! Artifact `en` values in the resulting chapter are replaced by the sentinel.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactFilter;
use crate::model::{Alignment, Chapter, Passage, NO_TRANSLATION};
use crate::refs::{PassageRef, RefScheme};
use crate::text::{
    single_sentence_problem, split_en_sentences, split_zh_sentences, strip_whitespace,
};
use crate::{Error, Result};

/// One sentence-level piece of a split paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPart {
    pub zh: String,
    pub en: String,
}

/// Candidate split of one paragraph-level passage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitProposal {
    /// Ref of the passage being split
    #[serde(rename = "ref")]
    pub reference: String,
    /// Passage text at proposal time; a mismatch at apply time means the plan is stale
    pub original: SplitPart,
    pub parts: Vec<SplitPart>,
    /// The aligner could not pair the sentences: every part carries its zh
    /// sentence and the whole translation sits on the first part. The
    /// operator distributes `en` across the parts and clears the flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
    /// Set by the reviewing operator, never by the splitter
    #[serde(default)]
    pub accepted: bool,
}

impl SplitProposal {
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// A proposal that would leave the passage as it is
    pub fn is_noop(&self) -> bool {
        self.parts.len() == 1 && self.parts[0] == self.original
    }
}

/// Reviewable set of proposals for one chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPlan {
    pub work: String,
    pub chapter: String,
    pub scheme: RefScheme,
    pub proposals: Vec<SplitProposal>,
}

impl SplitPlan {
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn accept_all(&mut self) {
        self.proposals.iter_mut().for_each(SplitProposal::accept);
    }

    /// Refs of proposals still waiting for review or for their English
    /// to be partitioned
    pub fn pending(&self) -> Vec<&str> {
        self.proposals
            .iter()
            .filter(|p| !p.accepted || p.unresolved)
            .map(|p| p.reference.as_str())
            .collect()
    }
}

/// Counts reported after a plan is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub passages_before: usize,
    pub passages_after: usize,
    pub proposals_applied: usize,
    pub artifacts_replaced: usize,
}

/// Builds and applies split plans
pub struct Splitter {
    artifacts: ArtifactFilter,
}

impl Splitter {
    pub fn new(artifacts: ArtifactFilter) -> Self {
        Self { artifacts }
    }

    /// Candidate split of one passage.
    ///
    /// Equal sentence counts pair one-to-one. When the counts differ by one,
    /// the last two sentences of the longer side are merged. Anything else
    /// splits the Chinese side and is marked `unresolved`, leaving the
    /// English to the operator. Passages without a usable translation split
    /// on the Chinese side only, every part getting the sentinel.
    pub fn propose(&self, passage: &Passage) -> SplitProposal {
        let original = SplitPart {
            zh: passage.zh.clone(),
            en: passage.en.clone(),
        };
        let zh = split_zh_sentences(&passage.zh);
        let untranslated = !passage.has_translation() || self.artifacts.is_artifact(&passage.en);

        let mut unresolved = false;
        let parts = if untranslated {
            zh.into_iter()
                .map(|zh| SplitPart {
                    zh,
                    en: NO_TRANSLATION.to_string(),
                })
                .collect()
        } else {
            match align(zh.clone(), split_en_sentences(&passage.en)) {
                Some(parts) => parts,
                None => {
                    unresolved = zh.len() > 1;
                    zh.into_iter()
                        .enumerate()
                        .map(|(i, zh)| SplitPart {
                            zh,
                            en: if i == 0 { passage.en.clone() } else { String::new() },
                        })
                        .collect()
                }
            }
        };

        let parts = if parts.len() > 1 {
            parts
        } else {
            vec![original.clone()]
        };

        debug!(
            reference = %passage.reference,
            parts = parts.len(),
            unresolved,
            "Split proposed"
        );

        SplitProposal {
            reference: passage.reference.clone(),
            original,
            parts,
            unresolved,
            accepted: false,
        }
    }

    /// Plan covering every passage of the chapter that would change, plus
    /// every passage that does not read as one sentence even if the splitter
    /// found nothing to do with it. A chapter already split cleanly yields an
    /// empty plan.
    pub fn propose_chapter(&self, work_id: &str, chapter: &Chapter, scheme: RefScheme) -> SplitPlan {
        let proposals: Vec<SplitProposal> = chapter
            .passages
            .iter()
            .map(|p| self.propose(p))
            .filter(|p| !p.is_noop() || single_sentence_problem(&p.original.zh).is_some())
            .collect();

        info!(
            work = work_id,
            chapter = %chapter.slug,
            proposals = proposals.len(),
            "Split plan built"
        );

        SplitPlan {
            work: work_id.to_string(),
            chapter: chapter.slug.clone(),
            scheme,
            proposals,
        }
    }

    /// Apply a reviewed plan to its chapter.
    ///
    /// Fails without touching the chapter when a proposal is unaccepted,
    /// stale, or does not reconstruct its original passage.
    pub fn apply_plan(&self, chapter: &mut Chapter, plan: &SplitPlan) -> Result<SplitSummary> {
        if plan.chapter != chapter.slug {
            return Err(Error::InvalidInput(format!(
                "plan is for chapter '{}', not '{}'",
                plan.chapter, chapter.slug
            )));
        }

        let pending = plan.pending();
        if !pending.is_empty() {
            return Err(Error::ReviewRequired(format!(
                "{}/{}: proposals not accepted: {}",
                plan.work,
                plan.chapter,
                pending.join(", ")
            )));
        }

        for proposal in &plan.proposals {
            self.check_proposal(&plan.work, chapter, proposal, plan.scheme)?;
        }

        let passages_before = chapter.passages.len();
        let mut passages = Vec::with_capacity(passages_before + plan.proposals.len());
        let mut shift: u32 = 0;

        for passage in &chapter.passages {
            let proposal = plan
                .proposals
                .iter()
                .find(|p| p.reference == passage.reference);

            let parts: Vec<SplitPart> = match proposal {
                Some(p) => p.parts.clone(),
                None => vec![SplitPart {
                    zh: passage.zh.clone(),
                    en: passage.en.clone(),
                }],
            };

            if shift == 0 && parts.len() == 1 {
                passages.push(Passage::new(
                    passage.reference.clone(),
                    parts[0].zh.clone(),
                    parts[0].en.clone(),
                ));
                continue;
            }

            let base = parse_ref(&plan.work, &chapter.slug, &passage.reference)?;
            let refs = renumber(&base, parts.len(), shift, plan.scheme).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{}/{}/{}: renumbering runs past the largest passage number",
                    plan.work, chapter.slug, passage.reference
                ))
            })?;
            if plan.scheme == RefScheme::Shift {
                shift = u32::try_from(parts.len() - 1)
                    .ok()
                    .and_then(|extra| shift.checked_add(extra))
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "{}/{}: too many passages to renumber",
                            plan.work, chapter.slug
                        ))
                    })?;
            }
            passages.extend(
                refs.into_iter()
                    .zip(parts)
                    .map(|(r, part)| Passage::new(r.to_string(), part.zh, part.en)),
            );
        }

        let mut artifacts_replaced = 0;
        for passage in &mut passages {
            if self.artifacts.is_artifact(&passage.en) {
                passage.en = NO_TRANSLATION.to_string();
                artifacts_replaced += 1;
            }
        }

        let remaining = passages
            .iter()
            .filter(|p| single_sentence_problem(&p.zh).is_some())
            .count();
        chapter.passages = passages;
        if remaining == 0 {
            chapter.alignment = Alignment::Sentence;
        } else {
            warn!(
                work = %plan.work,
                chapter = %chapter.slug,
                remaining,
                "Passages still read as more than one sentence; alignment left unchanged"
            );
        }

        let summary = SplitSummary {
            passages_before,
            passages_after: chapter.passages.len(),
            proposals_applied: plan.proposals.len(),
            artifacts_replaced,
        };
        info!(
            work = %plan.work,
            chapter = %chapter.slug,
            before = summary.passages_before,
            after = summary.passages_after,
            artifacts = summary.artifacts_replaced,
            "Split plan applied"
        );
        Ok(summary)
    }

    /// Apply one accepted proposal on its own
    pub fn apply_split(
        &self,
        work_id: &str,
        chapter: &mut Chapter,
        proposal: SplitProposal,
        scheme: RefScheme,
    ) -> Result<SplitSummary> {
        let plan = SplitPlan {
            work: work_id.to_string(),
            chapter: chapter.slug.clone(),
            scheme,
            proposals: vec![proposal],
        };
        self.apply_plan(chapter, &plan)
    }

    fn check_proposal(
        &self,
        work_id: &str,
        chapter: &Chapter,
        proposal: &SplitProposal,
        scheme: RefScheme,
    ) -> Result<()> {
        let path = format!("{}/{}/{}", work_id, chapter.slug, proposal.reference);
        let violation = |reason: String| Error::SplitInvariant {
            path: path.clone(),
            reason,
        };

        let passage = chapter.passage(&proposal.reference).ok_or_else(|| {
            Error::InvalidInput(format!("{}: no such passage in chapter", path))
        })?;
        if passage.zh != proposal.original.zh || passage.en != proposal.original.en {
            return Err(Error::InvalidInput(format!(
                "{}: passage changed since the plan was proposed",
                path
            )));
        }

        if proposal.parts.is_empty() {
            return Err(violation("proposal has no parts".to_string()));
        }
        if let Some(i) = proposal.parts.iter().position(|p| p.zh.trim().is_empty()) {
            return Err(violation(format!("part {} has empty zh", i + 1)));
        }

        let joined_zh: String = proposal.parts.iter().map(|p| p.zh.as_str()).collect();
        if strip_whitespace(&joined_zh) != strip_whitespace(&passage.zh) {
            return Err(violation(
                "concatenated zh does not reproduce the original paragraph".to_string(),
            ));
        }

        if passage.has_translation() && !self.artifacts.is_artifact(&passage.en) {
            let joined_en: String = proposal.parts.iter().map(|p| p.en.as_str()).collect();
            if strip_whitespace(&joined_en) != strip_whitespace(&passage.en) {
                return Err(violation(
                    "concatenated en does not reproduce the original translation".to_string(),
                ));
            }
        }

        if scheme == RefScheme::Dotted && proposal.parts.len() > 1 {
            let r = parse_ref(work_id, &chapter.slug, &proposal.reference)?;
            if r.is_dotted() {
                return Err(Error::InvalidInput(format!(
                    "{}: already a sentence-level ref; dotted refs cannot be split again",
                    path
                )));
            }
        }
        Ok(())
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(ArtifactFilter::default())
    }
}

fn parse_ref(work_id: &str, chapter: &str, reference: &str) -> Result<PassageRef> {
    reference.parse::<PassageRef>().map_err(|e| {
        Error::InvalidInput(format!("{}/{}/{}: cannot renumber: {}", work_id, chapter, reference, e))
    })
}

/// Refs for `count` passages taking the place of `base`, given the shift
/// accumulated by earlier splits in the chapter. `None` when a number
/// would not fit in a ref.
fn renumber(
    base: &PassageRef,
    count: usize,
    shift: u32,
    scheme: RefScheme,
) -> Option<Vec<PassageRef>> {
    let count = u32::try_from(count).ok()?;
    match scheme {
        RefScheme::Shift => {
            let first = base.passage.checked_add(shift)?;
            (0..count)
                .map(|i| first.checked_add(i).map(|n| base.with_passage(n)))
                .collect()
        }
        RefScheme::Dotted if count > 1 => Some(
            (1..=count)
                .map(|i| base.with_sentence(Some(i)))
                .collect(),
        ),
        RefScheme::Dotted => Some(vec![base.clone()]),
    }
}

/// Pair Chinese and English sentences; `None` when the counts are too far apart
fn align(zh: Vec<String>, mut en: Vec<String>) -> Option<Vec<SplitPart>> {
    if zh.is_empty() || en.is_empty() {
        return None;
    }

    let mut zh = zh;
    if zh.len() == en.len() + 1 {
        let last = zh.pop()?;
        if let Some(prev) = zh.last_mut() {
            prev.push_str(&last);
        }
    } else if en.len() == zh.len() + 1 {
        let last = en.pop()?;
        if let Some(prev) = en.last_mut() {
            prev.push(' ');
            prev.push_str(&last);
        }
    } else if zh.len() != en.len() {
        return None;
    }

    Some(
        zh.into_iter()
            .zip(en)
            .map(|(zh, en)| SplitPart { zh, en })
            .collect(),
    )
}

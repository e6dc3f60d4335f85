//! Per-flag decision state machine.
//!
//! Evaluation walks `ForcedOverride → ExperimentRules → RolloutRules → FlagDefault → Done`.
//! The first stage that produces a variation ends the walk; there is no scoring
//! across rules.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::config::{Experiment, Flag, ProjectConfig, Variation};
use crate::core::audience::audiences_match;
use crate::core::bucketer::Bucketer;
use crate::core::user_profile::{UserProfile, UserProfileService};
use crate::types::{Attributes, DecideOption, DecideOptions, Decision, DecisionSource};

/// Who is asking, and how.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub user_id: &'a str,
    pub attributes: &'a Attributes,
    /// Flag key → variation key.
    pub forced_decisions: &'a HashMap<String, String>,
    pub options: DecideOptions,
}

/// A decision plus what an impression event needs to describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub variation_id: Option<String>,
}

impl DecisionOutcome {
    /// Only experiment and rollout assignments are reported downstream.
    pub fn emits_impression(&self) -> bool {
        self.variation_id.is_some()
            && matches!(
                self.decision.source,
                DecisionSource::Experiment | DecisionSource::Rollout
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ForcedOverride,
    ExperimentRules,
    RolloutRules,
    FlagDefault,
    Done,
}

/// Decision trail. Informational entries are kept only on request; errors always.
struct Reasons {
    include_info: bool,
    messages: Vec<String>,
}

impl Reasons {
    fn new(options: DecideOptions) -> Self {
        Self {
            include_info: options.contains(DecideOption::IncludeReasons),
            messages: Vec::new(),
        }
    }

    fn info(&mut self, message: fmt::Arguments<'_>) {
        if self.include_info {
            self.messages.push(message.to_string());
        }
    }

    fn error(&mut self, message: String) {
        self.messages.push(message);
    }
}

enum ProfileState {
    NotLoaded,
    Loaded(UserProfile),
    Unavailable,
}

struct Assignment<'c> {
    rule: &'c Experiment,
    variation: &'c Variation,
    source: DecisionSource,
}

pub struct DecisionService {
    bucketer: Arc<dyn Bucketer>,
    user_profile_service: Option<Arc<dyn UserProfileService>>,
}

impl DecisionService {
    pub fn new(
        bucketer: Arc<dyn Bucketer>,
        user_profile_service: Option<Arc<dyn UserProfileService>>,
    ) -> Self {
        Self {
            bucketer,
            user_profile_service,
        }
    }

    /// Decides `flag_key` for the requesting user. Never fails.
    pub fn decide(
        &self,
        config: &ProjectConfig,
        flag_key: &str,
        request: &DecisionRequest<'_>,
    ) -> DecisionOutcome {
        let Some(flag) = config.flag(flag_key) else {
            tracing::debug!(flag = flag_key, "Flag not found");
            return DecisionOutcome {
                decision: Decision::flag_not_found(flag_key),
                variation_id: None,
            };
        };

        let mut reasons = Reasons::new(request.options);
        let mut assignment = None;
        let mut stage = Stage::ForcedOverride;

        while stage != Stage::Done {
            let next = match stage {
                Stage::ForcedOverride => {
                    assignment = self.forced_override(config, flag, request, &mut reasons);
                    if assignment.is_some() {
                        Stage::Done
                    } else if !flag.enabled {
                        reasons.info(format_args!("Flag \"{}\" is disabled.", flag.key));
                        Stage::FlagDefault
                    } else {
                        Stage::ExperimentRules
                    }
                }
                Stage::ExperimentRules => {
                    assignment = self.experiment_rules(config, flag, request, &mut reasons);
                    if assignment.is_some() {
                        Stage::Done
                    } else {
                        Stage::RolloutRules
                    }
                }
                Stage::RolloutRules => {
                    assignment = self.rollout_rules(config, flag, request, &mut reasons);
                    if assignment.is_some() {
                        Stage::Done
                    } else {
                        Stage::FlagDefault
                    }
                }
                Stage::FlagDefault => {
                    reasons.info(format_args!(
                        "User \"{}\" matched no rule of flag \"{}\"; serving \"{}\".",
                        request.user_id, flag.key, flag.default_variation_key
                    ));
                    Stage::Done
                }
                Stage::Done => Stage::Done,
            };
            tracing::debug!(flag = %flag.key, from = ?stage, to = ?next, "Decision stage");
            stage = next;
        }

        let include_variables = !request.options.contains(DecideOption::ExcludeVariables);

        match assignment {
            Some(Assignment {
                rule,
                variation,
                source,
            }) => {
                let forced = source == DecisionSource::ForcedDecision;
                DecisionOutcome {
                    decision: Decision {
                        flag_key: flag.key.clone(),
                        variation_key: variation.key.clone(),
                        enabled: variation.feature_enabled,
                        variables: if include_variables {
                            flag.resolve_variables(Some(variation))
                        } else {
                            HashMap::new()
                        },
                        rule_id: (!forced).then(|| rule.id.clone()),
                        rule_key: (!forced).then(|| rule.key.clone()),
                        source,
                        reasons: reasons.messages,
                    },
                    variation_id: Some(variation.id.clone()),
                }
            }
            None => DecisionOutcome {
                decision: Decision {
                    flag_key: flag.key.clone(),
                    variation_key: flag.default_variation_key.clone(),
                    enabled: false,
                    variables: if include_variables {
                        flag.resolve_variables(None)
                    } else {
                        HashMap::new()
                    },
                    rule_id: None,
                    rule_key: None,
                    source: DecisionSource::Default,
                    reasons: reasons.messages,
                },
                variation_id: None,
            },
        }
    }

    fn forced_override<'c>(
        &self,
        config: &'c ProjectConfig,
        flag: &'c Flag,
        request: &DecisionRequest<'_>,
        reasons: &mut Reasons,
    ) -> Option<Assignment<'c>> {
        let variation_key = request.forced_decisions.get(&flag.key)?;

        match config.flag_variation(flag, variation_key) {
            Some((rule, variation)) => {
                reasons.info(format_args!(
                    "Variation \"{}\" is forced for user \"{}\" on flag \"{}\".",
                    variation_key, request.user_id, flag.key
                ));
                Some(Assignment {
                    rule,
                    variation,
                    source: DecisionSource::ForcedDecision,
                })
            }
            None => {
                tracing::warn!(
                    flag = %flag.key,
                    variation = %variation_key,
                    "Forced variation does not exist on flag"
                );
                reasons.error(format!(
                    "Invalid variation \"{}\" is forced for flag \"{}\".",
                    variation_key, flag.key
                ));
                None
            }
        }
    }

    fn experiment_rules<'c>(
        &self,
        config: &'c ProjectConfig,
        flag: &'c Flag,
        request: &DecisionRequest<'_>,
        reasons: &mut Reasons,
    ) -> Option<Assignment<'c>> {
        let use_profiles = self.user_profile_service.is_some()
            && !request.options.contains(DecideOption::IgnoreUserProfileService);
        let mut profile = ProfileState::NotLoaded;
        let mut excluded_groups: HashSet<&str> = HashSet::new();

        for experiment_id in &flag.experiment_ids {
            let Some(experiment) = config.experiment(experiment_id) else {
                continue;
            };
            if !experiment.is_running() {
                reasons.info(format_args!("Experiment \"{}\" is not running.", experiment.key));
                continue;
            }

            if let Some(variation) = experiment
                .forced_variations
                .get(request.user_id)
                .and_then(|key| experiment.variation_by_key(key))
            {
                reasons.info(format_args!(
                    "User \"{}\" is whitelisted into variation \"{}\" of experiment \"{}\".",
                    request.user_id, variation.key, experiment.key
                ));
                return Some(Assignment {
                    rule: experiment,
                    variation,
                    source: DecisionSource::Experiment,
                });
            }

            // A stored assignment is served ahead of group and audience checks.
            if use_profiles {
                if let Some(variation) =
                    self.stored_variation(experiment, request.user_id, &mut profile, reasons)
                {
                    reasons.info(format_args!(
                        "Returning previously activated variation \"{}\" of experiment \"{}\".",
                        variation.key, experiment.key
                    ));
                    return Some(Assignment {
                        rule: experiment,
                        variation,
                        source: DecisionSource::Experiment,
                    });
                }
            }

            if let Some(group) = experiment
                .group_id
                .as_deref()
                .and_then(|id| config.group(id))
                .filter(|g| g.policy == "random")
            {
                if excluded_groups.contains(group.id.as_str()) {
                    continue;
                }
                match self
                    .bucketer
                    .allocate(&group.traffic_allocation, request.user_id, &group.id)
                {
                    None => {
                        reasons.info(format_args!(
                            "User \"{}\" is not in any experiment of group \"{}\".",
                            request.user_id, group.id
                        ));
                        excluded_groups.insert(group.id.as_str());
                        continue;
                    }
                    Some(selected) if selected != experiment.id => {
                        reasons.info(format_args!(
                            "User \"{}\" is not in experiment \"{}\" of group \"{}\".",
                            request.user_id, experiment.key, group.id
                        ));
                        continue;
                    }
                    Some(_) => {}
                }
            }

            let audience_matched =
                audiences_match(config, &experiment.audience_conditions, request.attributes);
            reasons.info(format_args!(
                "Audiences for experiment \"{}\" collectively evaluated to {}.",
                experiment.key, audience_matched
            ));
            if !audience_matched {
                continue;
            }

            let Some(variation) = self
                .bucketer
                .allocate(&experiment.traffic_allocation, request.user_id, &experiment.id)
                .and_then(|id| experiment.variation(id))
            else {
                reasons.info(format_args!(
                    "User \"{}\" is in no variation of experiment \"{}\".",
                    request.user_id, experiment.key
                ));
                continue;
            };

            reasons.info(format_args!(
                "User \"{}\" is in variation \"{}\" of experiment \"{}\".",
                request.user_id, variation.key, experiment.key
            ));
            if use_profiles {
                self.save_variation(experiment, variation, request.user_id, profile, reasons);
            }
            return Some(Assignment {
                rule: experiment,
                variation,
                source: DecisionSource::Experiment,
            });
        }

        None
    }

    fn rollout_rules<'c>(
        &self,
        config: &'c ProjectConfig,
        flag: &'c Flag,
        request: &DecisionRequest<'_>,
        reasons: &mut Reasons,
    ) -> Option<Assignment<'c>> {
        let rollout = flag.rollout_id.as_deref().and_then(|id| config.rollout(id))?;

        for rule in rollout.rules.iter().filter(|r| r.is_running()) {
            if !audiences_match(config, &rule.audience_conditions, request.attributes) {
                reasons.info(format_args!(
                    "User \"{}\" does not meet conditions for targeting rule \"{}\".",
                    request.user_id, rule.key
                ));
                continue;
            }

            let variation = self
                .bucketer
                .allocate(&rule.traffic_allocation, request.user_id, &rule.id)
                .and_then(|id| rule.variation(id));

            if let Some(variation) = variation {
                reasons.info(format_args!(
                    "User \"{}\" bucketed into targeting rule \"{}\".",
                    request.user_id, rule.key
                ));
                return Some(Assignment {
                    rule,
                    variation,
                    source: DecisionSource::Rollout,
                });
            }
            reasons.info(format_args!(
                "User \"{}\" is not in the traffic of targeting rule \"{}\".",
                request.user_id, rule.key
            ));
        }

        None
    }

    fn stored_variation<'c>(
        &self,
        experiment: &'c Experiment,
        user_id: &str,
        profile: &mut ProfileState,
        reasons: &mut Reasons,
    ) -> Option<&'c Variation> {
        if let ProfileState::NotLoaded = profile {
            *profile = match self.user_profile_service.as_ref()?.lookup(user_id) {
                Ok(found) => ProfileState::Loaded(found.unwrap_or_else(|| UserProfile::new(user_id))),
                Err(e) => {
                    tracing::warn!(user = user_id, error = %e, "User profile lookup failed");
                    reasons.error(format!(
                        "Error looking up user profile of user \"{}\": {}",
                        user_id, e
                    ));
                    ProfileState::Unavailable
                }
            };
        }

        match profile {
            ProfileState::Loaded(stored) => stored
                .variation_for(&experiment.id)
                .and_then(|id| experiment.variation(id)),
            _ => None,
        }
    }

    fn save_variation(
        &self,
        experiment: &Experiment,
        variation: &Variation,
        user_id: &str,
        profile: ProfileState,
        reasons: &mut Reasons,
    ) {
        let ProfileState::Loaded(mut stored) = profile else {
            return;
        };
        let Some(service) = self.user_profile_service.as_ref() else {
            return;
        };

        stored.set_variation(&experiment.id, &variation.id);
        if let Err(e) = service.save(stored) {
            tracing::warn!(user = user_id, error = %e, "User profile save failed");
            reasons.error(format!(
                "Error saving user profile of user \"{}\": {}",
                user_id, e
            ));
        }
    }
}

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::Result;

////////////////////////////////////////////////////////////
// Kind tables
////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ForceSsl,
    Redirect,
    OriginUrl,
    OverrideCacheTime,
    Block,
    SetResponseHeader,
    SetRequestHeader,
    ForceDownload,
    DisableTokenAuth,
    EnableTokenAuth,
    OverrideCacheTimePublic,
    IgnoreQueryString,
    DisableOptimizer,
    ForceCompression,
    SetStatusCode,
    BypassPermaCache,
}

impl ActionKind {
    pub fn code(self) -> u8 {
        match self {
            ActionKind::ForceSsl => 0,
            ActionKind::Redirect => 1,
            ActionKind::OriginUrl => 2,
            ActionKind::OverrideCacheTime => 3,
            ActionKind::Block => 4,
            ActionKind::SetResponseHeader => 5,
            ActionKind::SetRequestHeader => 6,
            ActionKind::ForceDownload => 7,
            ActionKind::DisableTokenAuth => 8,
            ActionKind::EnableTokenAuth => 9,
            ActionKind::OverrideCacheTimePublic => 10,
            ActionKind::IgnoreQueryString => 11,
            ActionKind::DisableOptimizer => 12,
            ActionKind::ForceCompression => 13,
            ActionKind::SetStatusCode => 14,
            ActionKind::BypassPermaCache => 15,
        }
    }

    /// Unrecognized remote codes decode to `Block`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ActionKind::ForceSsl,
            1 => ActionKind::Redirect,
            2 => ActionKind::OriginUrl,
            3 => ActionKind::OverrideCacheTime,
            4 => ActionKind::Block,
            5 => ActionKind::SetResponseHeader,
            6 => ActionKind::SetRequestHeader,
            7 => ActionKind::ForceDownload,
            8 => ActionKind::DisableTokenAuth,
            9 => ActionKind::EnableTokenAuth,
            10 => ActionKind::OverrideCacheTimePublic,
            11 => ActionKind::IgnoreQueryString,
            12 => ActionKind::DisableOptimizer,
            13 => ActionKind::ForceCompression,
            14 => ActionKind::SetStatusCode,
            15 => ActionKind::BypassPermaCache,
            _ => ActionKind::Block,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Url,
    RequestHeader,
    ResponseHeader,
    UrlExtension,
    CountryCode,
    RemoteIp,
    UrlQueryString,
    RandomChance,
    StatusCode,
    RequestMethod,
}

impl TriggerKind {
    pub fn code(self) -> u8 {
        match self {
            TriggerKind::Url => 0,
            TriggerKind::RequestHeader => 1,
            TriggerKind::ResponseHeader => 2,
            TriggerKind::UrlExtension => 3,
            TriggerKind::CountryCode => 4,
            TriggerKind::RemoteIp => 5,
            TriggerKind::UrlQueryString => 6,
            TriggerKind::RandomChance => 7,
            TriggerKind::StatusCode => 8,
            TriggerKind::RequestMethod => 9,
        }
    }

    /// Unrecognized remote codes decode to `Url`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TriggerKind::Url,
            1 => TriggerKind::RequestHeader,
            2 => TriggerKind::ResponseHeader,
            3 => TriggerKind::UrlExtension,
            4 => TriggerKind::CountryCode,
            5 => TriggerKind::RemoteIp,
            6 => TriggerKind::UrlQueryString,
            7 => TriggerKind::RandomChance,
            8 => TriggerKind::StatusCode,
            9 => TriggerKind::RequestMethod,
            _ => TriggerKind::Url,
        }
    }
}

/// How multiple patterns, or multiple triggers on one rule, combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Any,
    All,
    None,
}

impl MatchKind {
    pub fn code(self) -> u8 {
        match self {
            MatchKind::Any => 0,
            MatchKind::All => 1,
            MatchKind::None => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MatchKind::Any),
            1 => Some(MatchKind::All),
            2 => Some(MatchKind::None),
            _ => Option::None,
        }
    }
}

impl Default for MatchKind {
    fn default() -> Self {
        MatchKind::Any
    }
}

fn default_trigger_match() -> MatchKind {
    MatchKind::All
}

fn default_enabled() -> bool {
    true
}

fn default_redirect_status() -> String {
    "301".to_string()
}

////////////////////////////////////////////////////////////
// Triggers
////////////////////////////////////////////////////////////

/// One match condition. The config shape doubles as the in-memory model,
/// it carries exactly the fields the remote entity does.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(rename = "match", default)]
    pub match_mode: MatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl TriggerConfig {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "Type": self.kind.code(),
            "PatternMatches": self.patterns,
            "PatternMatchingType": self.match_mode.code(),
        });
        if let Some(parameter) = &self.parameter {
            payload["Parameter1"] = parameter.clone().into();
        }
        payload
    }

    pub fn from_api(data: &Value) -> Self {
        Self {
            kind: TriggerKind::from_code(data["Type"].as_u64().unwrap_or(0) as u8),
            patterns: data["PatternMatches"]
                .as_array()
                .map(|ps| {
                    ps.iter()
                        .filter_map(|p| p.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            match_mode: MatchKind::from_code(data["PatternMatchingType"].as_u64().unwrap_or(0) as u8)
                .unwrap_or(MatchKind::Any),
            parameter: data["Parameter1"].as_str().map(str::to_string),
        }
    }
}

////////////////////////////////////////////////////////////
// Actions
////////////////////////////////////////////////////////////

/// An action in remote form: a kind and up to two opaque parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRuleAction {
    pub kind: ActionKind,
    pub parameter1: Option<String>,
    pub parameter2: Option<String>,
}

impl EdgeRuleAction {
    fn new(kind: ActionKind, parameter1: Option<String>, parameter2: Option<String>) -> Self {
        Self {
            kind,
            parameter1,
            parameter2,
        }
    }
}

/// An action as written in the configuration file, with type-specific
/// fields instead of positional parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    ForceSsl,
    Redirect {
        url: String,
        #[serde(default = "default_redirect_status")]
        status_code: String,
    },
    OriginUrl {
        url: String,
    },
    OverrideCacheTime {
        seconds: u64,
    },
    Block,
    SetResponseHeader {
        header: String,
        value: String,
    },
    SetRequestHeader {
        header: String,
        value: String,
    },
    ForceDownload,
    DisableTokenAuth,
    EnableTokenAuth,
    OverrideCacheTimePublic {
        seconds: u64,
    },
    IgnoreQueryString,
    DisableOptimizer,
    ForceCompression,
    SetStatusCode {
        code: u16,
    },
    BypassPermaCache,
}

impl ActionConfig {
    pub fn to_action(&self) -> EdgeRuleAction {
        match self {
            ActionConfig::ForceSsl => EdgeRuleAction::new(ActionKind::ForceSsl, None, None),
            ActionConfig::Redirect { url, status_code } => EdgeRuleAction::new(
                ActionKind::Redirect,
                Some(url.clone()),
                Some(status_code.clone()),
            ),
            ActionConfig::OriginUrl { url } => {
                EdgeRuleAction::new(ActionKind::OriginUrl, Some(url.clone()), None)
            }
            ActionConfig::OverrideCacheTime { seconds } => EdgeRuleAction::new(
                ActionKind::OverrideCacheTime,
                Some(seconds.to_string()),
                None,
            ),
            ActionConfig::Block => EdgeRuleAction::new(ActionKind::Block, None, None),
            ActionConfig::SetResponseHeader { header, value } => EdgeRuleAction::new(
                ActionKind::SetResponseHeader,
                Some(header.clone()),
                Some(value.clone()),
            ),
            ActionConfig::SetRequestHeader { header, value } => EdgeRuleAction::new(
                ActionKind::SetRequestHeader,
                Some(header.clone()),
                Some(value.clone()),
            ),
            ActionConfig::ForceDownload => {
                EdgeRuleAction::new(ActionKind::ForceDownload, None, None)
            }
            ActionConfig::DisableTokenAuth => {
                EdgeRuleAction::new(ActionKind::DisableTokenAuth, None, None)
            }
            ActionConfig::EnableTokenAuth => {
                EdgeRuleAction::new(ActionKind::EnableTokenAuth, None, None)
            }
            ActionConfig::OverrideCacheTimePublic { seconds } => EdgeRuleAction::new(
                ActionKind::OverrideCacheTimePublic,
                Some(seconds.to_string()),
                None,
            ),
            ActionConfig::IgnoreQueryString => {
                EdgeRuleAction::new(ActionKind::IgnoreQueryString, None, None)
            }
            ActionConfig::DisableOptimizer => {
                EdgeRuleAction::new(ActionKind::DisableOptimizer, None, None)
            }
            ActionConfig::ForceCompression => {
                EdgeRuleAction::new(ActionKind::ForceCompression, None, None)
            }
            ActionConfig::SetStatusCode { code } => {
                EdgeRuleAction::new(ActionKind::SetStatusCode, Some(code.to_string()), None)
            }
            ActionConfig::BypassPermaCache => {
                EdgeRuleAction::new(ActionKind::BypassPermaCache, None, None)
            }
        }
    }

    pub fn from_action(action: &EdgeRuleAction) -> Self {
        let p1 = || action.parameter1.clone().unwrap_or_default();
        match action.kind {
            ActionKind::ForceSsl => ActionConfig::ForceSsl,
            ActionKind::Redirect => ActionConfig::Redirect {
                url: p1(),
                status_code: action
                    .parameter2
                    .clone()
                    .unwrap_or_else(default_redirect_status),
            },
            ActionKind::OriginUrl => ActionConfig::OriginUrl { url: p1() },
            ActionKind::OverrideCacheTime => ActionConfig::OverrideCacheTime {
                seconds: p1().parse().unwrap_or(0),
            },
            ActionKind::Block => ActionConfig::Block,
            ActionKind::SetResponseHeader => ActionConfig::SetResponseHeader {
                header: p1(),
                value: action.parameter2.clone().unwrap_or_default(),
            },
            ActionKind::SetRequestHeader => ActionConfig::SetRequestHeader {
                header: p1(),
                value: action.parameter2.clone().unwrap_or_default(),
            },
            ActionKind::ForceDownload => ActionConfig::ForceDownload,
            ActionKind::DisableTokenAuth => ActionConfig::DisableTokenAuth,
            ActionKind::EnableTokenAuth => ActionConfig::EnableTokenAuth,
            ActionKind::OverrideCacheTimePublic => ActionConfig::OverrideCacheTimePublic {
                seconds: p1().parse().unwrap_or(0),
            },
            ActionKind::IgnoreQueryString => ActionConfig::IgnoreQueryString,
            ActionKind::DisableOptimizer => ActionConfig::DisableOptimizer,
            ActionKind::ForceCompression => ActionConfig::ForceCompression,
            ActionKind::SetStatusCode => ActionConfig::SetStatusCode {
                code: p1().parse().unwrap_or(200),
            },
            ActionKind::BypassPermaCache => ActionConfig::BypassPermaCache,
        }
    }
}

////////////////////////////////////////////////////////////
// Rules
////////////////////////////////////////////////////////////

/// A logical rule: one trigger set shared by any number of actions.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRule {
    pub description: String,
    pub enabled: bool,
    pub triggers: Vec<TriggerConfig>,
    pub actions: Vec<EdgeRuleAction>,
    pub trigger_match: MatchKind,
}

/// A remote rule entity: exactly one action per entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRule {
    pub guid: Option<String>,
    pub description: String,
    pub enabled: bool,
    pub triggers: Vec<TriggerConfig>,
    pub action: EdgeRuleAction,
    pub trigger_match: MatchKind,
}

impl RemoteRule {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "ActionType": self.action.kind.code(),
            "Triggers": self.triggers.iter().map(TriggerConfig::to_payload).collect::<Vec<_>>(),
            "TriggerMatchingType": self.trigger_match.code(),
            "Description": self.description,
            "Enabled": self.enabled,
        });
        if let Some(p1) = &self.action.parameter1 {
            payload["ActionParameter1"] = p1.clone().into();
        }
        if let Some(p2) = &self.action.parameter2 {
            payload["ActionParameter2"] = p2.clone().into();
        }
        if let Some(guid) = &self.guid {
            payload["Guid"] = guid.clone().into();
        }
        payload
    }

    pub fn from_api(data: &Value) -> Self {
        Self {
            guid: data["Guid"].as_str().map(str::to_string),
            description: data["Description"].as_str().unwrap_or("").to_string(),
            enabled: data["Enabled"].as_bool().unwrap_or(true),
            triggers: data["Triggers"]
                .as_array()
                .map(|ts| ts.iter().map(TriggerConfig::from_api).collect())
                .unwrap_or_default(),
            action: EdgeRuleAction::new(
                ActionKind::from_code(data["ActionType"].as_u64().unwrap_or(0) as u8),
                data["ActionParameter1"].as_str().map(str::to_string),
                data["ActionParameter2"].as_str().map(str::to_string),
            ),
            trigger_match: MatchKind::from_code(
                data["TriggerMatchingType"].as_u64().unwrap_or(1) as u8
            )
            .unwrap_or(MatchKind::All),
        }
    }
}

/// A logical rule as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EdgeRuleConfig {
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_trigger_match")]
    pub trigger_match: MatchKind,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl Default for EdgeRuleConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            enabled: default_enabled(),
            trigger_match: default_trigger_match(),
            triggers: Vec::new(),
            actions: Vec::new(),
        }
    }
}

impl EdgeRuleConfig {
    pub fn to_rule(&self) -> EdgeRule {
        EdgeRule {
            description: self.description.clone(),
            enabled: self.enabled,
            triggers: self.triggers.clone(),
            actions: self.actions.iter().map(ActionConfig::to_action).collect(),
            trigger_match: self.trigger_match,
        }
    }

    pub fn from_rule(rule: &EdgeRule) -> Self {
        Self {
            description: rule.description.clone(),
            enabled: rule.enabled,
            trigger_match: rule.trigger_match,
            triggers: rule.triggers.clone(),
            actions: rule.actions.iter().map(ActionConfig::from_action).collect(),
        }
    }
}

////////////////////////////////////////////////////////////
// Multi-action codec
////////////////////////////////////////////////////////////

/// Encode one logical rule into remote entities, one per action. With more
/// than one action each entity's description gets a 1-based ordinal suffix
/// so the entities can be regrouped on decode.
pub fn encode_rule(rule: &EdgeRule) -> Vec<RemoteRule> {
    rule.actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            let description = if rule.actions.len() > 1 {
                format!("{} (action {})", rule.description, i + 1)
            } else {
                rule.description.clone()
            };
            RemoteRule {
                guid: None,
                description,
                enabled: rule.enabled,
                triggers: rule.triggers.clone(),
                action: action.clone(),
                trigger_match: rule.trigger_match,
            }
        })
        .collect()
}

/// Regroup remote entities into logical rules: entities that share the
/// suffix-stripped description, enabled flag, trigger-combination mode and
/// trigger sequence fold back into one rule, actions in entity order.
pub fn decode_rules(entities: &[RemoteRule]) -> Vec<EdgeRule> {
    let mut rules: Vec<EdgeRule> = Vec::new();

    for entity in entities {
        let description = strip_action_suffix(&entity.description);
        let group = rules.iter_mut().find(|rule| {
            rule.description == description
                && rule.enabled == entity.enabled
                && rule.trigger_match == entity.trigger_match
                && rule.triggers == entity.triggers
        });
        match group {
            Some(rule) => rule.actions.push(entity.action.clone()),
            Option::None => rules.push(EdgeRule {
                description: description.to_string(),
                enabled: entity.enabled,
                triggers: entity.triggers.clone(),
                actions: vec![entity.action.clone()],
                trigger_match: entity.trigger_match,
            }),
        }
    }

    rules
}

/// Strip a trailing `" (action N)"` ordinal suffix, if present.
fn strip_action_suffix(description: &str) -> &str {
    const MARKER: &str = " (action ";
    if let Some(idx) = description.rfind(MARKER) {
        let tail = &description[idx + MARKER.len()..];
        if let Some(ordinal) = tail.strip_suffix(')') {
            if !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit()) {
                return &description[..idx];
            }
        }
    }
    description
}

////////////////////////////////////////////////////////////
// Manager
////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Default)]
pub struct EdgeRulesReport {
    pub deleted: Vec<String>,
    pub created: Vec<String>,
    pub changes: Vec<String>,
}

pub struct EdgeRulesManager<'a> {
    client: &'a ApiClient,
}

impl<'a> EdgeRulesManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Rule entities come embedded in the pull zone body.
    pub async fn get_rules(&self, zone_id: i64) -> Result<Vec<RemoteRule>> {
        let response = self.client.get(&format!("/pullzone/{zone_id}"), None).await?;
        let rules = response["EdgeRules"]
            .as_array()
            .map(|rs| rs.iter().map(RemoteRule::from_api).collect())
            .unwrap_or_default();
        Ok(rules)
    }

    pub async fn add_rule(&self, zone_id: i64, rule: &RemoteRule) -> Result<()> {
        debug!("adding edge rule '{}' to zone {zone_id}", rule.description);
        self.client
            .post(
                &format!("/pullzone/{zone_id}/edgerules/addOrUpdate"),
                Some(rule.to_payload()),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_rule(&self, zone_id: i64, guid: &str) -> Result<()> {
        debug!("deleting edge rule {guid} from zone {zone_id}");
        self.client
            .delete(&format!("/pullzone/{zone_id}/edgerules/{guid}"), None)
            .await?;
        Ok(())
    }

    /// Decode the zone's remote entities back into logical config rules.
    pub async fn export_rules(&self, zone_id: i64) -> Result<Vec<EdgeRuleConfig>> {
        let entities = self.get_rules(zone_id).await?;
        Ok(decode_rules(&entities)
            .iter()
            .map(EdgeRuleConfig::from_rule)
            .collect())
    }

    /// Replace the zone's rules wholesale: delete every existing entity,
    /// then create every encoded entity from the desired configs. Remote
    /// rule identifiers do not survive a sync.
    pub async fn sync_rules(
        &self,
        zone_id: i64,
        rule_configs: &[EdgeRuleConfig],
        dry_run: bool,
    ) -> Result<EdgeRulesReport> {
        let mut report = EdgeRulesReport::default();

        let current = self.get_rules(zone_id).await?;
        let desired: Vec<RemoteRule> = rule_configs
            .iter()
            .flat_map(|config| encode_rule(&config.to_rule()))
            .collect();

        for rule in &current {
            report.deleted.push(rule.description.clone());
            report.changes.push(format!("Deleting rule: {}", rule.description));
            if !dry_run {
                if let Some(guid) = &rule.guid {
                    self.delete_rule(zone_id, guid).await?;
                }
            }
        }

        for rule in &desired {
            report.created.push(rule.description.clone());
            report.changes.push(format!("Creating rule: {}", rule.description));
            if !dry_run {
                self.add_rule(zone_id, rule).await?;
            }
        }

        Ok(report)
    }
}

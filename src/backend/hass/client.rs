use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use huginn_api::config::HubConfig;

use crate::error::{ApiError, ApiResult};
use crate::model::{EnhancedEntityState, EntityState, scrub_template_field};

/// Read/write surface of the Home Assistant instance.
///
/// Read methods are best-effort: transport and parse failures are logged
/// and degrade to empty results. `invoke_service` is the one exception;
/// commands must not fail silently, so write errors propagate.
#[async_trait]
pub trait HubApi: Send + Sync {
    async fn fetch_all_states(&self) -> ApiResult<Vec<EntityState>>;

    async fn fetch_areas(&self) -> ApiResult<Vec<String>>;

    async fn fetch_enhanced_entities(
        &self,
        domain: Option<&str>,
        area: Option<&str>,
    ) -> ApiResult<Vec<EnhancedEntityState>>;

    async fn invoke_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        payload: Map<String, Value>,
    ) -> ApiResult<()>;
}

#[derive(Debug, Serialize)]
struct HassTemplateRequest<'a> {
    template: &'a str,
}

pub struct HassClient {
    base_url: Url,
    http: reqwest::Client,
    token: String,
}

impl HassClient {
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(config: &HubConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        let token_env = config.token_env_name();
        let token = std::env::var(token_env).map_err(|_| {
            ApiError::service_error(format!("Missing Home Assistant token env var {token_env}"))
        })?;
        if token.trim().is_empty() {
            return Err(ApiError::service_error(format!(
                "Empty Home Assistant token in env var {token_env}"
            )));
        }

        Ok(Self {
            base_url: config.url.clone(),
            http,
            token,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        let base = if self.base_url.path().is_empty() {
            format!("{}/", self.base_url)
        } else {
            self.base_url.to_string()
        };
        let base = Url::parse(&base)?;
        Ok(base.join(endpoint.trim_start_matches('/'))?)
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        action: &str,
    ) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| String::new());

        let details = if body.is_empty() {
            format!("{status}")
        } else {
            format!("{status}: {body}")
        };

        let err = if status == StatusCode::UNAUTHORIZED {
            format!("Home Assistant unauthorized during {action}. Verify HASS_TOKEN")
        } else {
            format!("Home Assistant error during {action}: {details}")
        };

        Err(ApiError::service_error(err))
    }

    async fn get_states(&self) -> ApiResult<Vec<EntityState>> {
        let url = self.endpoint_url("/api/states")?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let response = self.check_status(response, "GET /api/states").await?;
        Ok(response.json().await?)
    }

    /// Render a jinja template server-side and return the raw text output.
    pub async fn render_template(&self, template: &str) -> ApiResult<String> {
        let url = self.endpoint_url("/api/template")?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&HassTemplateRequest { template })
            .send()
            .await?;
        let response = self.check_status(response, "POST /api/template").await?;
        Ok(response.text().await?)
    }

    /// One line per entity: `entity_id|name|area_id|area_name|floor|state`.
    /// Area and floor are resolved inline so a full sync needs no
    /// per-entity follow-up calls.
    fn enhanced_template(domain: Option<&str>, area: Option<&str>) -> String {
        let mut conditions = Vec::new();
        if let Some(domain) = domain {
            conditions.push(format!("s.entity_id.startswith('{domain}.')"));
        }
        if let Some(area) = area {
            conditions.push(format!("area_name(s.entity_id) == '{area}'"));
        }
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" if {}", conditions.join(" and "))
        };

        format!(
            "{{% for s in states{clause} %}}\n\
             {{{{ s.entity_id }}}}|{{{{ s.name }}}}|{{{{ area_id(s.entity_id) or '' }}}}|{{{{ area_name(s.entity_id) or '' }}}}|{{{{ floor_name(s.entity_id) or '' }}}}|{{{{ s.state }}}}\n\
             {{% endfor %}}"
        )
    }

    fn parse_enhanced_line(
        line: &str,
        attributes: &HashMap<String, Map<String, Value>>,
    ) -> Option<EnhancedEntityState> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 6 {
            return None;
        }

        let entity_id = parts[0].trim();
        if entity_id.is_empty() {
            return None;
        }

        let attrs = attributes.get(entity_id).cloned().unwrap_or_default();
        let friendly_name = scrub_template_field(parts[1])
            .or_else(|| {
                attrs
                    .get("friendly_name")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| entity_id.to_string());

        Some(EnhancedEntityState {
            entity_id: entity_id.to_string(),
            friendly_name,
            area_id: scrub_template_field(parts[2]),
            area: scrub_template_field(parts[3]),
            floor: scrub_template_field(parts[4]),
            state: parts[5].trim().to_string(),
            attributes: attrs,
        })
    }

    async fn try_fetch_enhanced(
        &self,
        domain: Option<&str>,
        area: Option<&str>,
    ) -> ApiResult<Vec<EnhancedEntityState>> {
        let template = Self::enhanced_template(domain, area);
        let rendered = self.render_template(&template).await?;
        if rendered.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Attribute maps are not representable in a pipe-separated template
        // line; one states fetch covers all entities in a single request.
        let attributes: HashMap<String, Map<String, Value>> = self
            .fetch_all_states()
            .await?
            .into_iter()
            .map(|s| (s.entity_id, s.attributes))
            .collect();

        Ok(rendered
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| Self::parse_enhanced_line(line, &attributes))
            .collect())
    }

    /// Raw states mapped without area/floor resolution, with the domain
    /// filter re-applied client-side. Area filtering is not recoverable
    /// here: the raw state payload carries no area information.
    async fn fallback_states(&self, domain: Option<&str>) -> ApiResult<Vec<EnhancedEntityState>> {
        let states = self.fetch_all_states().await?;
        Ok(states
            .into_iter()
            .filter(|s| domain.is_none_or(|d| s.entity_id.starts_with(&format!("{d}."))))
            .map(EnhancedEntityState::from_state)
            .collect())
    }
}

#[async_trait]
impl HubApi for HassClient {
    async fn fetch_all_states(&self) -> ApiResult<Vec<EntityState>> {
        match self.get_states().await {
            Ok(states) => {
                log::debug!("Fetched {} entities from Home Assistant", states.len());
                Ok(states)
            }
            Err(err) => {
                log::error!("Failed to fetch states from Home Assistant: {err}");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_areas(&self) -> ApiResult<Vec<String>> {
        const AREAS_TEMPLATE: &str = "{% for a in areas() %}\n{{ area_name(a) or '' }}\n{% endfor %}";

        match self.render_template(AREAS_TEMPLATE).await {
            Ok(rendered) => Ok(parse_area_lines(&rendered)),
            Err(err) => {
                log::error!("Failed to fetch areas from Home Assistant: {err}");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_enhanced_entities(
        &self,
        domain: Option<&str>,
        area: Option<&str>,
    ) -> ApiResult<Vec<EnhancedEntityState>> {
        match self.try_fetch_enhanced(domain, area).await {
            Ok(entities) if !entities.is_empty() => Ok(entities),
            Ok(_) => {
                log::warn!("Entity template query returned nothing, falling back to raw states");
                self.fallback_states(domain).await
            }
            Err(err) => {
                log::warn!("Entity template query failed ({err}), falling back to raw states");
                self.fallback_states(domain).await
            }
        }
    }

    async fn invoke_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        mut payload: Map<String, Value>,
    ) -> ApiResult<()> {
        log::info!("Calling service {domain}.{service} for entity {entity_id}");

        let url = self.endpoint_url(&format!("/api/services/{domain}/{service}"))?;
        if !entity_id.trim().is_empty() {
            payload.insert(
                "entity_id".to_string(),
                Value::String(entity_id.to_string()),
            );
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&Value::Object(payload))
            .send()
            .await?;
        let _response = self
            .check_status(response, &format!("POST /api/services/{domain}/{service}"))
            .await?;
        Ok(())
    }
}

fn parse_area_lines(rendered: &str) -> Vec<String> {
    use itertools::Itertools;

    rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .unique()
        .collect()
}

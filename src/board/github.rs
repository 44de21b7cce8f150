use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::{
    AddedItem, BoardApi, Connection, FieldNode, FieldUpdate, IssueFilter, ItemPage,
};
use crate::config::BoardConfig;
use crate::model::field::FieldSchema;
use crate::model::item::{BoardItem, IssueSummary};

const GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// A GitHub Projects (v2) board reached over GraphQL, with repository
/// operations going through the `gh` CLI.
pub struct GitHubBoard {
    owner: String,
    number: u64,
    repo: Option<String>,
    token: String,
    client: reqwest::Client,
    project_id: OnceCell<String>,
}

impl GitHubBoard {
    pub async fn connect(board: &BoardConfig) -> Result<Self> {
        let token = resolve_token().await?;
        Ok(Self {
            owner: board.owner.clone(),
            number: board.number,
            repo: board.repo.clone(),
            token,
            client: reqwest::Client::new(),
            project_id: OnceCell::new(),
        })
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(GRAPHQL_URL)
            .bearer_auth(&self.token)
            .header("User-Agent", "gh-board")
            .json(&body)
            .send()
            .await
            .context("GitHub API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("GitHub API returned {status}: {text}");
        }

        let gql: GqlResponse<T> = resp.json().await.context("Failed to parse GitHub response")?;
        if let Some(errors) = gql.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            bail!("GitHub API error: {}", messages.join("; "));
        }
        gql.data.context("No data in GitHub response")
    }

    async fn project_id(&self) -> Result<&str> {
        let id = self
            .project_id
            .get_or_try_init(|| self.lookup_project_id())
            .await?;
        Ok(id.as_str())
    }

    async fn lookup_project_id(&self) -> Result<String> {
        let vars = json!({ "owner": self.owner, "number": self.number });

        let org: Result<OrgData> = self.graphql(ORG_PROJECT_QUERY, vars.clone()).await;
        if let Ok(Some(id)) = org.map(|d| d.organization.and_then(|o| o.project_v2).map(|p| p.id)) {
            return Ok(id);
        }

        let user: UserData = self
            .graphql(USER_PROJECT_QUERY, vars)
            .await
            .with_context(|| format!("Project {} not found for {}", self.number, self.owner))?;
        let id = user
            .user
            .and_then(|u| u.project_v2)
            .map(|p| p.id)
            .with_context(|| format!("Project {} not found for {}", self.number, self.owner))?;
        tracing::debug!(project = %id, "resolved project id");
        Ok(id)
    }

    fn repo(&self) -> Result<&str> {
        self.repo
            .as_deref()
            .context("No repository configured. Set board.repo to owner/name")
    }
}

#[async_trait]
impl BoardApi for GitHubBoard {
    async fn list_fields(&self) -> Result<Vec<FieldSchema>> {
        let project = self.project_id().await?;
        let data: NodeData<FieldsNode> = self
            .graphql(FIELDS_QUERY, json!({ "project": project }))
            .await
            .context("Failed to list project fields")?;
        let fields = data
            .node
            .context("Project not found")?
            .fields
            .nodes
            .into_iter()
            .flatten()
            .filter_map(FieldNode::into_schema)
            .collect();
        Ok(fields)
    }

    async fn list_items(&self, first: usize, after: Option<&str>) -> Result<ItemPage> {
        let project = self.project_id().await?;
        let data: NodeData<ItemsNode> = self
            .graphql(
                ITEMS_QUERY,
                json!({ "project": project, "first": first, "after": after }),
            )
            .await
            .context("Failed to list project items")?;
        Ok(data.node.context("Project not found")?.items)
    }

    async fn add_item(&self, content_id: &str) -> Result<AddedItem> {
        let project = self.project_id().await?;
        let data: AddItemData = self
            .graphql(
                ADD_ITEM_MUTATION,
                json!({ "project": project, "content": content_id }),
            )
            .await
            .context("Failed to add issue to project")?;
        Ok(data.add_project_v2_item_by_id.item)
    }

    async fn update_field(&self, item_id: &str, field_id: &str, value: &FieldUpdate) -> Result<()> {
        let project = self.project_id().await?;
        let _: Value = self
            .graphql(
                UPDATE_FIELD_MUTATION,
                json!({
                    "project": project,
                    "item": item_id,
                    "field": field_id,
                    "value": field_update_value(value),
                }),
            )
            .await
            .context("Failed to update field value")?;
        Ok(())
    }

    async fn add_labels(&self, item: &BoardItem, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let mut args = vec!["issue".to_string(), "edit".to_string()];
        match &item.url {
            Some(url) => args.push(url.clone()),
            None => {
                args.push(item.number.to_string());
                args.push("--repo".into());
                args.push(self.repo()?.to_string());
            }
        }
        args.push("--add-label".into());
        args.push(labels.join(","));
        run_gh(&args).await?;
        Ok(())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueSummary>> {
        let args = issue_list_args(self.repo()?, filter);
        let stdout = run_gh(&args).await?;
        let issues: Vec<IssueSummary> =
            serde_json::from_slice(&stdout).context("Failed to parse gh output")?;
        Ok(issues)
    }
}

fn field_update_value(value: &FieldUpdate) -> Value {
    match value {
        FieldUpdate::SingleSelect(option_id) => json!({ "singleSelectOptionId": option_id }),
        FieldUpdate::Text(text) => json!({ "text": text }),
        FieldUpdate::Number(number) => json!({ "number": number }),
    }
}

fn issue_list_args(repo: &str, filter: &IssueFilter) -> Vec<String> {
    let state = if filter.state.is_empty() {
        "open"
    } else {
        filter.state.as_str()
    };
    let mut args: Vec<String> = [
        "issue",
        "list",
        "--repo",
        repo,
        "--state",
        state,
        "--json",
        "number,title,id,url,labels",
        "--limit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(filter.limit.to_string());

    if let Some(search) = &filter.search {
        args.push("--search".into());
        args.push(search.clone());
    }
    args
}

async fn run_gh(args: &[String]) -> Result<Vec<u8>> {
    tracing::debug!(?args, "running gh");
    let output = tokio::process::Command::new("gh")
        .args(args)
        .output()
        .await
        .context("Failed to run gh CLI")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("gh {} failed: {}", args.first().map(String::as_str).unwrap_or(""), stderr.trim());
    }
    Ok(output.stdout)
}

async fn resolve_token() -> Result<String> {
    for var in ["GH_TOKEN", "GITHUB_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
    }
    let stdout = run_gh(&["auth".to_string(), "token".to_string()])
        .await
        .context("No GitHub token. Run `gh auth login` or set GH_TOKEN")?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct OrgData {
    organization: Option<ProjectOwner>,
}

#[derive(Deserialize)]
struct UserData {
    user: Option<ProjectOwner>,
}

#[derive(Deserialize)]
struct ProjectOwner {
    #[serde(rename = "projectV2")]
    project_v2: Option<ProjectId>,
}

#[derive(Deserialize)]
struct ProjectId {
    id: String,
}

#[derive(Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Deserialize)]
struct FieldsNode {
    fields: Connection<FieldNode>,
}

#[derive(Deserialize)]
struct ItemsNode {
    items: ItemPage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemData {
    add_project_v2_item_by_id: AddItemPayload,
}

#[derive(Deserialize)]
struct AddItemPayload {
    item: AddedItem,
}

const ORG_PROJECT_QUERY: &str = r#"query($owner: String!, $number: Int!) {
  organization(login: $owner) { projectV2(number: $number) { id } }
}"#;

const USER_PROJECT_QUERY: &str = r#"query($owner: String!, $number: Int!) {
  user(login: $owner) { projectV2(number: $number) { id } }
}"#;

const FIELDS_QUERY: &str = r#"query($project: ID!) {
  node(id: $project) {
    ... on ProjectV2 {
      fields(first: 100) {
        nodes {
          ... on ProjectV2FieldCommon { id name dataType }
          ... on ProjectV2SingleSelectField { options { id name } }
        }
      }
    }
  }
}"#;

const ITEMS_QUERY: &str = r#"query($project: ID!, $first: Int!, $after: String) {
  node(id: $project) {
    ... on ProjectV2 {
      items(first: $first, after: $after) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          databaseId
          content {
            ... on Issue {
              id number title state url
              labels(first: 50) { nodes { name } }
            }
          }
          fieldValues(first: 50) {
            nodes {
              ... on ProjectV2ItemFieldSingleSelectValue {
                optionId name
                field { ... on ProjectV2FieldCommon { name } }
              }
              ... on ProjectV2ItemFieldTextValue {
                text
                field { ... on ProjectV2FieldCommon { name } }
              }
              ... on ProjectV2ItemFieldNumberValue {
                number
                field { ... on ProjectV2FieldCommon { name } }
              }
            }
          }
        }
      }
    }
  }
}"#;

const ADD_ITEM_MUTATION: &str = r#"mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: { projectId: $project, contentId: $content }) {
    item { id databaseId }
  }
}"#;

const UPDATE_FIELD_MUTATION: &str = r#"mutation($project: ID!, $item: ID!, $field: ID!, $value: ProjectV2FieldValue!) {
  updateProjectV2ItemFieldValue(
    input: { projectId: $project, itemId: $item, fieldId: $field, value: $value }
  ) {
    projectV2Item { id }
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_payload_per_field_type() {
        assert_eq!(
            field_update_value(&FieldUpdate::SingleSelect("opt".into())),
            json!({ "singleSelectOptionId": "opt" })
        );
        assert_eq!(
            field_update_value(&FieldUpdate::Text("hello".into())),
            json!({ "text": "hello" })
        );
        assert_eq!(
            field_update_value(&FieldUpdate::Number(2.5)),
            json!({ "number": 2.5 })
        );
    }

    #[test]
    fn issue_list_args_include_filters() {
        let filter = IssueFilter {
            state: String::new(),
            search: Some("crash -label:\"pm-tracked\"".into()),
            limit: 30,
        };
        let args = issue_list_args("acme/widgets", &filter);
        let joined = args.join(" ");
        assert!(joined.starts_with("issue list --repo acme/widgets --state open"));
        assert!(joined.contains("--limit 30"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("crash -label:\"pm-tracked\"")
        );
        assert_eq!(args[args.len() - 2], "--search");
    }

    #[test]
    fn add_item_response_decodes() {
        let data: AddItemData = serde_json::from_value(json!({
            "addProjectV2ItemById": { "item": { "id": "PVTI_9", "databaseId": 99 } }
        }))
        .unwrap();
        assert_eq!(data.add_project_v2_item_by_id.item.item_id, "PVTI_9");
        assert_eq!(data.add_project_v2_item_by_id.item.database_id, Some(99));
    }

    #[test]
    fn graphql_errors_decode() {
        let resp: GqlResponse<OrgData> = serde_json::from_value(json!({
            "data": { "organization": null },
            "errors": [{ "message": "Could not resolve to an Organization" }]
        }))
        .unwrap();
        assert!(resp.data.unwrap().organization.is_none());
        assert_eq!(resp.errors.unwrap()[0].message, "Could not resolve to an Organization");
    }
}

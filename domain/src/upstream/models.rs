use super::{Document, Resource, UpstreamError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

fn id_of(resource: &Resource) -> Result<String, UpstreamError> {
    resource
        .id
        .clone()
        .ok_or_else(|| UpstreamError::Malformed(format!("{} resource without id", resource.kind)))
}

fn attributes<T: serde::de::DeserializeOwned>(resource: &Resource) -> Result<T, UpstreamError> {
    resource
        .attributes()
        .map_err(|e| UpstreamError::Malformed(format!("{} attributes: {}", resource.kind, e)))
}

fn included<'a, T>(
    document: &'a Document<T>,
    resource: &Resource,
    relationship: &str,
) -> Result<&'a Resource, UpstreamError> {
    resource
        .related(relationship)
        .and_then(|identifier| document.find_included(identifier))
        .ok_or_else(|| {
            UpstreamError::Malformed(format!(
                "{} relationship {} not included",
                resource.kind, relationship
            ))
        })
}

/// Member of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Identifier
    pub id: String,
    /// Member code
    pub code: String,
    /// Display name
    pub name: String,
    /// Account in the accounting service
    pub account: Option<String>,
}

#[derive(Deserialize)]
struct MemberAttributes {
    #[serde(default)]
    code: String,
    #[serde(default)]
    name: String,
}

impl Member {
    pub(super) fn from_resource(resource: &Resource) -> Result<Self, UpstreamError> {
        let attributes: MemberAttributes = attributes(resource)?;

        Ok(Self {
            id: id_of(resource)?,
            code: attributes.code,
            name: attributes.name,
            account: resource.related("account").map(|a| a.id.clone()),
        })
    }
}

/// Account related preferences of a user
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserSettings {
    /// Preferred language
    #[serde(default)]
    pub language: String,
    /// Whether the user agreed to receive communication from the platform
    #[serde(default)]
    pub komunitin: bool,
    /// Push notification preferences
    #[serde(default)]
    pub notifications: Map<String, Value>,
    /// Email preferences
    #[serde(default)]
    pub emails: Map<String, Value>,
}

impl UserSettings {
    /// Whether the user wants emails of the given kind
    pub fn wants_email(&self, kind: &str) -> bool {
        self.komunitin && matches!(self.emails.get(kind), Some(Value::Bool(true)))
    }
}

/// Person using the platform
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Identifier
    pub id: String,
    /// Email address
    pub email: String,
    /// Members this user acts as
    pub members: Vec<String>,
    /// Settings, present when they have been included
    pub settings: Option<UserSettings>,
}

#[derive(Deserialize)]
struct UserAttributes {
    #[serde(default)]
    email: String,
}

impl User {
    pub(super) fn from_resource<T>(
        document: &Document<T>,
        resource: &Resource,
    ) -> Result<Self, UpstreamError> {
        let attributes: UserAttributes = attributes(resource)?;

        let settings = match resource.related("settings") {
            Some(identifier) => match document.find_included(identifier) {
                Some(included) => Some(self::attributes::<UserSettings>(included)?),
                None => None,
            },
            None => None,
        };

        Ok(Self {
            id: id_of(resource)?,
            email: attributes.email,
            members: resource
                .related_all("members")
                .into_iter()
                .map(|m| m.id.clone())
                .collect(),
            settings,
        })
    }

    /// Whether the user wants emails of the given kind
    pub fn wants_email(&self, kind: &str) -> bool {
        self.settings
            .as_ref()
            .map(|settings| settings.wants_email(kind))
            .unwrap_or(false)
    }

    /// Preferred language, if known
    pub fn language(&self) -> Option<&str> {
        self.settings
            .as_ref()
            .map(|s| s.language.as_str())
            .filter(|l| !l.is_empty())
    }
}

/// Community group
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Identifier
    pub id: String,
    /// Group code
    pub code: String,
    /// Display name
    pub name: String,
    /// Administrators, present when they have been included
    pub admins: Vec<User>,
}

#[derive(Deserialize)]
struct GroupAttributes {
    #[serde(default)]
    code: String,
    #[serde(default)]
    name: String,
}

impl Group {
    pub(super) fn from_document(document: &Document<Resource>) -> Result<Self, UpstreamError> {
        let resource = &document.data;
        let attributes: GroupAttributes = attributes(resource)?;

        let admins = resource
            .related_all("admins")
            .into_iter()
            .filter_map(|identifier| document.find_included(identifier))
            .map(|admin| User::from_resource(document, admin))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            id: id_of(resource)?,
            code: attributes.code,
            name: attributes.name,
            admins,
        })
    }
}

/// Unit of value transferred between accounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    /// Currency code, equal to the group code
    #[serde(default)]
    pub code: String,
    /// Singular name
    #[serde(default)]
    pub name: String,
    /// Plural name
    #[serde(default)]
    pub name_plural: String,
    /// Symbol
    #[serde(default)]
    pub symbol: String,
    /// Decimal places shown to users
    #[serde(default)]
    pub decimals: u32,
    /// Power of ten amounts are scaled by
    #[serde(default)]
    pub scale: u32,
}

impl Currency {
    /// Renders an amount in minor units for humans
    pub fn format(&self, amount: i64) -> String {
        let value = amount as f64 / 10f64.powi(self.scale as i32);
        format!("{:.*} {}", self.decimals as usize, value, self.symbol)
            .trim_end()
            .to_owned()
    }
}

/// Account in the accounting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Identifier
    pub id: String,
    /// Account code
    pub code: String,
}

#[derive(Deserialize)]
struct AccountAttributes {
    #[serde(default)]
    code: String,
}

impl Account {
    fn from_resource(resource: &Resource) -> Result<Self, UpstreamError> {
        let attributes: AccountAttributes = attributes(resource)?;

        Ok(Self {
            id: id_of(resource)?,
            code: attributes.code,
        })
    }
}

/// Movement of value between two accounts
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Identifier
    pub id: String,
    /// Amount in minor units of the currency
    pub amount: i64,
    /// Description
    pub meta: String,
    /// Lifecycle state
    pub state: String,
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Paying account
    pub payer: Account,
    /// Receiving account
    pub payee: Account,
    /// Currency the amount is expressed in
    pub currency: Currency,
}

#[derive(Deserialize)]
struct TransferAttributes {
    amount: i64,
    #[serde(default)]
    meta: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
}

impl Transfer {
    pub(super) fn from_document(document: &Document<Resource>) -> Result<Self, UpstreamError> {
        let resource = &document.data;
        let attributes: TransferAttributes = attributes(resource)?;

        Ok(Self {
            id: id_of(resource)?,
            amount: attributes.amount,
            meta: attributes.meta,
            state: attributes.state,
            created: attributes.created,
            payer: Account::from_resource(included(document, resource, "payer")?)?,
            payee: Account::from_resource(included(document, resource, "payee")?)?,
            currency: self::attributes(included(document, resource, "currency")?)?,
        })
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn assemble_transfers_from_included_resources() {
        let document: Document<Resource> = serde_json::from_value(json!({
            "data": {
                "type": "transfers", "id": "t1",
                "attributes": { "amount": 12345, "meta": "Bread", "state": "committed" },
                "relationships": {
                    "payer": { "data": { "type": "accounts", "id": "a1" } },
                    "payee": { "data": { "type": "accounts", "id": "a2" } },
                    "currency": { "data": { "type": "currencies", "id": "c1" } }
                }
            },
            "included": [
                { "type": "accounts", "id": "a1", "attributes": { "code": "GRP10001" } },
                { "type": "accounts", "id": "a2", "attributes": { "code": "GRP10002" } },
                { "type": "currencies", "id": "c1", "attributes": {
                    "code": "GRP1", "symbol": "ℏ", "decimals": 2, "scale": 4
                } }
            ]
        }))
        .unwrap();

        let transfer = Transfer::from_document(&document).unwrap();

        assert_eq!(transfer.payer.code, "GRP10001");
        assert_eq!(transfer.payee.code, "GRP10002");
        assert_eq!(transfer.currency.format(transfer.amount), "1.23 ℏ");
    }

    #[test]
    fn reject_transfers_without_currency() {
        let document: Document<Resource> = serde_json::from_value(json!({
            "data": {
                "type": "transfers", "id": "t1",
                "attributes": { "amount": 1 },
                "relationships": {}
            }
        }))
        .unwrap();

        assert!(matches!(
            Transfer::from_document(&document),
            Err(UpstreamError::Malformed(_))
        ));
    }

    #[test]
    fn respect_email_preferences() {
        let mut settings = UserSettings {
            komunitin: true,
            ..Default::default()
        };
        settings.emails.insert("myAccount".into(), Value::Bool(true));
        assert!(settings.wants_email("myAccount"));

        settings.komunitin = false;
        assert!(!settings.wants_email("myAccount"));
    }
}

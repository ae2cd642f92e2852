//! The REST client for the chat marketplace account.
//!
//! Implements the engine's [`MarketplaceApi`] seam plus the two polling calls the chat worker needs (paid orders and
//! unread messages). The marketplace intermittently answers listing-field reads with HTTP 422 for perfectly healthy
//! listings; that status maps onto [`MarketplaceError::ParsingError`] so the sync scheduler can fall back to its
//! last known price instead of flagging the listing.

use std::{collections::BTreeMap, str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dgf_common::{helpers::coerce_listing_id, Money};
use fulfillment_engine::{
    events::{IncomingMessage, NewOrder},
    traits::{ChatHandle, ListingFields, ListingSummary, MarketplaceApi, MarketplaceError},
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::MarketplaceConfig;

const PRICE_FIELD: &str = "price";

#[derive(Clone)]
pub struct MarketplaceClient {
    base_url: String,
    client: Arc<Client>,
}

impl MarketplaceClient {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.token.reveal()))
            .map_err(|e| MarketplaceError::Transport(e.to_string()))?;
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarketplaceError::Transport(e.to_string()))?;
        Ok(Self { base_url: config.base_url, client: Arc::new(client) })
    }

    async fn query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MarketplaceError> {
        let url = format!("{}{path}", self.base_url);
        trace!("🏪️ {method} {url}");
        let mut req = self.client.request(method, &url);
        if let Some(body) = &body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| MarketplaceError::Transport(e.to_string()))?;
        match response.status() {
            s if s.is_success() => {
                response.json::<T>().await.map_err(|e| MarketplaceError::Transport(e.to_string()))
            },
            StatusCode::UNPROCESSABLE_ENTITY => Err(MarketplaceError::ParsingError),
            StatusCode::NOT_FOUND => Err(MarketplaceError::NotFound(url)),
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(MarketplaceError::Transport(format!("{url} answered {s}: {text}")))
            },
        }
    }

    /// Paid orders created after the given cutoff, oldest first.
    pub async fn new_orders(&self, newer_than: DateTime<Utc>) -> Result<Vec<NewOrder>, MarketplaceError> {
        #[derive(Deserialize)]
        struct OrdersResponse {
            orders: Vec<RawOrder>,
        }
        let path = format!("/orders?status=paid&newer_than={}", newer_than.to_rfc3339());
        let result = self.query::<OrdersResponse, ()>(Method::GET, &path, None).await?;
        let mut orders: Vec<NewOrder> = result.orders.into_iter().map(NewOrder::from).collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    /// Buyer messages that arrived since the last poll.
    pub async fn unread_messages(&self) -> Result<Vec<IncomingMessage>, MarketplaceError> {
        #[derive(Deserialize)]
        struct MessagesResponse {
            messages: Vec<RawMessage>,
        }
        let result = self.query::<MessagesResponse, ()>(Method::GET, "/chats/unread", None).await?;
        Ok(result.messages.into_iter().map(IncomingMessage::from).collect())
    }

    /// All listings in the category that the marketplace reports as active.
    pub async fn active_listing_ids(&self, category: &str) -> Result<Vec<String>, MarketplaceError> {
        let listings = self.listings_in_category(category).await?;
        Ok(listings.into_iter().filter(|l| l.active).map(|l| l.id).collect())
    }
}

impl MarketplaceApi for MarketplaceClient {
    async fn listings_in_category(&self, category: &str) -> Result<Vec<ListingSummary>, MarketplaceError> {
        #[derive(Deserialize)]
        struct ListingsResponse {
            listings: Vec<RawListing>,
        }
        let path = format!("/categories/{category}/listings");
        let result = self.query::<ListingsResponse, ()>(Method::GET, &path, None).await?;
        Ok(result.listings.into_iter().map(ListingSummary::from).collect())
    }

    async fn listing_fields(&self, listing_id: &str) -> Result<ListingFields, MarketplaceError> {
        let raw =
            self.query::<RawFields, ()>(Method::GET, &format!("/listings/{listing_id}"), None).await?;
        Ok(raw.into())
    }

    async fn save_listing(&self, fields: &ListingFields) -> Result<(), MarketplaceError> {
        let raw = RawFields::from(fields);
        debug!("🏪️ Saving listing {}", fields.id);
        self.query::<serde_json::Value, RawFields>(Method::PUT, &format!("/listings/{}", fields.id), Some(raw))
            .await
            .map(|_| ())
    }

    async fn chat_by_buyer(&self, buyer: &str) -> Result<Option<ChatHandle>, MarketplaceError> {
        #[derive(Deserialize)]
        struct ChatsResponse {
            chats: Vec<RawChat>,
        }
        let result = self.query::<ChatsResponse, ()>(Method::GET, &format!("/chats?buyer={buyer}"), None).await?;
        Ok(result.chats.into_iter().next().map(|c| ChatHandle { id: c.id, name: c.name }))
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MarketplaceError> {
        #[derive(Serialize)]
        struct SendMessage<'a> {
            text: &'a str,
        }
        debug!("🏪️ Sending message to chat {chat_id}");
        self.query::<serde_json::Value, SendMessage>(
            Method::POST,
            &format!("/chats/{chat_id}/messages"),
            Some(SendMessage { text }),
        )
        .await
        .map(|_| ())
    }

    async fn set_listing_active(&self, listing_id: &str, active: bool) -> Result<(), MarketplaceError> {
        #[derive(Serialize)]
        struct SetActive {
            active: bool,
        }
        // The status endpoint wants the numeric part of the listing id only.
        let id = coerce_listing_id(listing_id)
            .ok_or_else(|| MarketplaceError::NotFound(format!("listing id {listing_id} has no numeric part")))?;
        info!("🏪️ Setting listing {listing_id} active={active}");
        self.query::<serde_json::Value, SetActive>(
            Method::POST,
            &format!("/listings/{id}/status"),
            Some(SetActive { active }),
        )
        .await
        .map(|_| ())
    }
}

//--------------------------------------     Wire types      ---------------------------------------------------------

#[derive(Deserialize)]
struct RawOrder {
    id: String,
    chat_id: i64,
    buyer: String,
    description: String,
    price: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<RawOrder> for NewOrder {
    fn from(raw: RawOrder) -> Self {
        let price = raw.price.and_then(|p| Money::try_from(p).ok());
        NewOrder {
            order_id: raw.id,
            chat_id: raw.chat_id,
            chat_name: raw.buyer,
            description: raw.description,
            price,
            created_at: raw.created_at,
        }
    }
}

#[derive(Deserialize)]
struct RawMessage {
    chat_id: i64,
    chat_name: String,
    text: String,
}

impl From<RawMessage> for IncomingMessage {
    fn from(raw: RawMessage) -> Self {
        IncomingMessage { chat_id: raw.chat_id, chat_name: raw.chat_name, text: raw.text }
    }
}

#[derive(Deserialize)]
struct RawListing {
    id: String,
    description: String,
    #[serde(default)]
    active: bool,
}

impl From<RawListing> for ListingSummary {
    fn from(raw: RawListing) -> Self {
        ListingSummary { id: raw.id, description: raw.description, active: raw.active }
    }
}

#[derive(Deserialize)]
struct RawChat {
    id: i64,
    name: String,
}

/// Listing fields travel as an opaque string map; only the price field is interpreted.
#[derive(Serialize, Deserialize)]
struct RawFields {
    id: String,
    fields: BTreeMap<String, String>,
}

impl From<RawFields> for ListingFields {
    fn from(raw: RawFields) -> Self {
        let price = raw.fields.get(PRICE_FIELD).and_then(|p| Money::from_str(p).ok());
        ListingFields { id: raw.id, price, fields: raw.fields }
    }
}

impl From<&ListingFields> for RawFields {
    fn from(fields: &ListingFields) -> Self {
        let mut raw = fields.fields.clone();
        if let Some(price) = fields.price {
            raw.insert(PRICE_FIELD.to_string(), price.to_string());
        }
        Self { id: fields.id.clone(), fields: raw }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn listing_fields_round_trip_the_price_through_the_field_map() {
        let raw = RawFields {
            id: "42-1".to_string(),
            fields: BTreeMap::from([
                (PRICE_FIELD.to_string(), "1234.50".to_string()),
                ("title".to_string(), "Elden Ring (RU)".to_string()),
            ]),
        };
        let fields = ListingFields::from(raw);
        assert_eq!(fields.price, Some(Money::from_str("1234.50").unwrap()));

        let mut updated = fields.clone();
        updated.price = Some(Money::from_str("1300.00").unwrap());
        let raw = RawFields::from(&updated);
        assert_eq!(raw.fields[PRICE_FIELD], "1300.00");
        assert_eq!(raw.fields["title"], "Elden Ring (RU)");
    }

    #[test]
    fn unparseable_price_fields_become_none() {
        let raw = RawFields {
            id: "42-1".to_string(),
            fields: BTreeMap::from([(PRICE_FIELD.to_string(), "n/a".to_string())]),
        };
        assert_eq!(ListingFields::from(raw).price, None);
    }
}

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Serialize)]
pub enum ResponseStatus {
    Success,
}

/// Envelope type for API responses
///
/// When serializing as JSON, the inner object is returned under the field name
/// given to [`ApiResponse::new`], e.g. `{"beers": [...]}`.
pub struct ApiResponseEnvelope<T: Serialize> {
    name: &'static str,
    inner: T,
}

#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub status: ResponseStatus,
    pub data: ApiResponseEnvelope<T>,
    pub messages: Option<Vec<String>>,
}

impl<T> Serialize for ApiResponseEnvelope<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(1))?;
        state.serialize_entry(self.name, &self.inner)?;
        state.end()
    }
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn new(name: &'static str, data: T) -> ApiResponse<T> {
        ApiResponse {
            status: ResponseStatus::Success,
            data: ApiResponseEnvelope { name, inner: data },
            messages: None,
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> ApiResponse<T> {
        self.messages
            .get_or_insert_with(Vec::new)
            .push(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_keyed_by_name() {
        let response = ApiResponse::new("beers", vec!["Pliny"]).with_message("1 result");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "status": "Success",
                "data": { "beers": ["Pliny"] },
                "messages": ["1 result"],
            })
        );
    }
}

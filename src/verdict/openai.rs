/// OpenAI-compatible chat completion classifier
use super::classifier::{parse_response, Classifier, ClassifierError, ClassifierResponse};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

pub struct OpenAiClassifier {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    temperature: f32,
}

impl OpenAiClassifier {
    /// Without an API key every call reports the classifier as unavailable
    pub fn new(
        model: impl Into<String>,
        base_url: Option<String>,
        api_key: Option<String>,
        temperature: f32,
    ) -> Self {
        let client = api_key.map(|key| {
            let mut cfg = OpenAIConfig::default().with_api_key(key);
            if let Some(url) = base_url {
                cfg = cfg.with_api_base(url);
            }
            Client::with_config(cfg)
        });

        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, prompt: &str) -> Result<ClassifierResponse, ClassifierError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ClassifierError::Unavailable("no API key configured".to_string()))?;

        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| ClassifierError::Request(e.to_string()))?
            .into();
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(vec![message])
            .temperature(self.temperature)
            .build()
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ClassifierError::Malformed("empty completion".to_string()))?;

        parse_response(&content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let classifier = OpenAiClassifier::new("gpt-4o-mini", None, None, 0.2);
        assert!(!classifier.is_configured());
        assert_eq!(classifier.name(), "gpt-4o-mini");

        let err = classifier.classify("prompt").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Unavailable(_)));
    }

    #[test]
    fn test_configured_with_key() {
        let classifier = OpenAiClassifier::new(
            "gpt-4o-mini",
            Some("http://localhost:9".to_string()),
            Some("sk-test".to_string()),
            0.2,
        );
        assert!(classifier.is_configured());
    }
}

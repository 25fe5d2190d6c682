use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    LocationRecord,
    stage::{EmptyReason, StageOutcome, StageScope},
    upstream::UpstreamClient,
    validate::Cep,
};

use super::LocationProvider;

/// Placeholder replaced by the validated code in the location URL template.
pub const CEP_PLACEHOLDER: &str = "{cep}";

pub const DEFAULT_URL_TEMPLATE: &str = "https://viacep.com.br/ws/{cep}/json/";

#[derive(Debug, Clone)]
pub struct ViaCepProvider {
    client: UpstreamClient,
    url_template: String,
}

impl ViaCepProvider {
    pub fn new(client: UpstreamClient, url_template: String) -> Self {
        Self { client, url_template }
    }

    pub fn url_for(&self, code: &Cep) -> String {
        self.url_template.replace(CEP_PLACEHOLDER, code.as_str())
    }
}

#[async_trait]
impl LocationProvider for ViaCepProvider {
    async fn resolve_location(&self, stage: &StageScope, code: &Cep) -> StageOutcome<LocationRecord> {
        let result = self.client.fetch(stage, &self.url_for(code)).await;
        let body = match stage.settle(result) {
            Ok(body) => body,
            Err(outcome) => return outcome,
        };

        let outcome = parse_location(&body);
        if let StageOutcome::Found(record) = &outcome {
            info!(cep = %code, city = %record.city, "city located");
        } else {
            info!(cep = %code, "unable to locate city for zipcode");
        }
        outcome
    }
}

/// Missing or blank `localidade` is a soft not-found; malformed JSON folds into the same path.
fn parse_location(body: &[u8]) -> StageOutcome<LocationRecord> {
    match serde_json::from_slice::<LocationRecord>(body) {
        Ok(record) if record.is_located() => StageOutcome::Found(record),
        Ok(_) => StageOutcome::Empty(EmptyReason::NotFound),
        Err(err) => {
            warn!(error = %err, "failed to parse location payload");
            StageOutcome::Empty(EmptyReason::Unparseable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_cep;

    #[test]
    fn url_substitutes_code() {
        let provider = ViaCepProvider::new(UpstreamClient::new(), DEFAULT_URL_TEMPLATE.into());
        let cep = validate_cep("01001-000").unwrap();

        assert_eq!(provider.url_for(&cep), "https://viacep.com.br/ws/01001000/json/");
    }

    #[test]
    fn parses_viacep_payload() {
        let body = r#"{
            "cep": "01001-000",
            "logradouro": "Praça da Sé",
            "complemento": "lado ímpar",
            "bairro": "Sé",
            "localidade": "São Paulo",
            "uf": "SP",
            "ibge": "3550308"
        }"#;

        let record = parse_location(body.as_bytes()).found().unwrap();
        assert_eq!(record.code, "01001-000");
        assert_eq!(record.street, "Praça da Sé");
        assert_eq!(record.district, "Sé");
        assert_eq!(record.city, "São Paulo");
        assert_eq!(record.state, "SP");
    }

    #[test]
    fn error_payload_is_not_found() {
        assert!(matches!(
            parse_location(br#"{"erro": "true"}"#),
            StageOutcome::Empty(EmptyReason::NotFound)
        ));
    }

    #[test]
    fn malformed_payload_is_unparseable() {
        assert!(matches!(
            parse_location(b"<html>bad gateway</html>"),
            StageOutcome::Empty(EmptyReason::Unparseable)
        ));
    }
}

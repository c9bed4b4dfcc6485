// src/services/notification_service.rs

use async_trait::async_trait;

/// Canal de avisos (SMS em produção). Melhor esforço: quem chama nunca
/// falha por causa de um aviso que não saiu.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> bool;
}

/// Implementação padrão: só registra no log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> bool {
        tracing::info!(destination = %destination, message = %message, "📨 Notificação enviada");
        true
    }
}

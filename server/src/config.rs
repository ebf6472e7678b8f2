//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use seance_db::DatabaseConfig;
use seance_relay::RelayConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Karenzzeiten, Keepalive)
    pub relay: RelayEinstellungen,
    /// Aufzeichnungs-Einstellungen
    pub aufzeichnung: AufzeichnungsEinstellungen,
    /// Datenbank-Einstellungen (Audit-Protokoll)
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Seance Relay".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Listener
    pub bind_adresse: String,
    /// Port fuer den TCP-Listener
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 3000,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Karenzzeit in Millisekunden, bevor ein verdraengter Socket faellt
    pub bump_karenz_ms: u64,
    /// Abstand der Keepalive-Pruefungen in Sekunden
    pub keepalive_sek: u64,
    /// Eingangsstille in Sekunden, nach der eine Verbindung als tot gilt
    pub zeitlimit_sek: u64,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            bump_karenz_ms: 500,
            keepalive_sek: 25,
            zeitlimit_sek: 60,
        }
    }
}

/// Aufzeichnungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AufzeichnungsEinstellungen {
    /// Wurzelverzeichnis der Aufzeichnungs-Artefakte
    pub pfad: String,
}

impl Default for AufzeichnungsEinstellungen {
    fn default() -> Self {
        Self {
            pfad: "captures".into(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Aktiviert das Audit-Protokoll in SQLite
    pub aktiviert: bool,
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            url: "sqlite://seance.db".into(),
            max_verbindungen: 5,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Leitet die Relay-Konfiguration ab
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            bump_karenz_ms: self.relay.bump_karenz_ms,
            keepalive_sek: self.relay.keepalive_sek,
            zeitlimit_sek: self.relay.zeitlimit_sek,
            max_clients: self.server.max_clients,
        }
    }

    /// Leitet die Datenbank-Konfiguration ab
    pub fn db_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.netzwerk.tcp_port, 3000);
        assert_eq!(cfg.aufzeichnung.pfad, "captures");
        assert!(!cfg.datenbank.aktiviert);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adresse_setzt_sich_zusammen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse(), "0.0.0.0:3000");
    }

    #[test]
    fn relay_config_uebernimmt_die_karenzzeit() {
        let cfg = ServerConfig::default();
        let relay = cfg.relay_config();
        assert_eq!(relay.bump_karenz_ms, 500);
        assert_eq!(relay.max_clients, 512);
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Relay"
            max_clients = 100

            [netzwerk]
            tcp_port = 10000

            [relay]
            bump_karenz_ms = 250
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Relay");
        assert_eq!(cfg.server.max_clients, 100);
        assert_eq!(cfg.netzwerk.tcp_port, 10000);
        assert_eq!(cfg.relay.bump_karenz_ms, 250);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.relay.keepalive_sek, 25);
        assert_eq!(cfg.aufzeichnung.pfad, "captures");
    }
}

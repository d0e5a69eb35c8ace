//! Applying YAML overrides on top of the environment-derived configuration

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{AuthApiSecret, ServerConfig, TlsConfig, env};

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

/// Load the environment and apply YAML values over it (YAML wins).
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        set(&mut config.host, server.host);
        set(&mut config.port, server.port);
        set_opt(&mut config.public_url, server.public_url);

        if let Some(tls) = server.tls {
            match (tls.enabled.unwrap_or(true), tls.cert_path, tls.key_path) {
                (false, _, _) => config.tls = None,
                (true, Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    })
                }
                (true, None, None) => {}
                _ => return Err("server.tls requires both cert_path and key_path".into()),
            }
        }
    }

    if let Some(voice) = yaml.voice {
        let target = &mut config.voice;
        set(&mut target.audio_codec, voice.audio_codec);
        set(&mut target.sample_rate, voice.sample_rate);
        set(&mut target.frame_bytes, voice.frame_bytes);
        set(&mut target.buffer_window_ms, voice.buffer_window_ms);
        set(&mut target.silence_threshold_ms, voice.silence_threshold_ms);
        set(&mut target.stt_timeout_ms, voice.stt_timeout_ms);
        set(&mut target.llm_timeout_ms, voice.llm_timeout_ms);
        set(&mut target.tts_timeout_ms, voice.tts_timeout_ms);
        set(&mut target.persist_timeout_ms, voice.persist_timeout_ms);
        set(&mut target.ping_interval_secs, voice.ping_interval_secs);
        set(&mut target.pong_wait_secs, voice.pong_wait_secs);
        set(&mut target.max_message_bytes, voice.max_message_bytes);
        set(&mut target.stt_wrap_wav, voice.stt_wrap_wav);
        set_opt(&mut target.stt_language, voice.stt_language);
        set_opt(&mut target.default_greeting, voice.default_greeting);
    }

    if let Some(providers) = yaml.providers {
        set_opt(&mut config.openai_api_key, providers.openai_api_key);
        set(&mut config.openai_base_url, providers.openai_base_url);
        set(&mut config.stt_model, providers.stt_model);
        set_opt(&mut config.stt_fallback_base_url, providers.stt_fallback_base_url);
        set_opt(&mut config.stt_fallback_api_key, providers.stt_fallback_api_key);
        set_opt(&mut config.stt_fallback_model, providers.stt_fallback_model);
        set(&mut config.llm_model, providers.llm_model);
        set(&mut config.llm_temperature, providers.llm_temperature);
        set(&mut config.llm_max_tokens, providers.llm_max_tokens);
        set(&mut config.tts_model, providers.tts_model);
        set(&mut config.tts_voice, providers.tts_voice);
        set(&mut config.tts_format, providers.tts_format);
    }

    if let Some(call_store) = yaml.call_store {
        set_opt(&mut config.call_store_url, call_store.url);
        set_opt(&mut config.call_store_token, call_store.token);
    }

    if let Some(auth) = yaml.auth {
        set(&mut config.auth_required, auth.required);
        // api_secrets takes precedence over the legacy single secret
        if !auth.api_secrets.is_empty() {
            config.auth_api_secrets = auth
                .api_secrets
                .into_iter()
                .map(|entry| AuthApiSecret {
                    id: entry.id,
                    secret: entry.secret,
                })
                .collect();
        } else if let Some(secret) = auth.api_secret {
            config.auth_api_secrets = vec![AuthApiSecret {
                id: "default".to_string(),
                secret,
            }];
        }
    }

    if let Some(security) = yaml.security {
        set_opt(&mut config.cors_allowed_origins, security.cors_allowed_origins);
    }

    Ok(config)
}

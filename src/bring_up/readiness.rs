/// Literal substrings that turn free-form vendor output into a readiness signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Markers {
    pub ready: Vec<String>,
    pub failed: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            ready: vec!["rtsp://".to_string()],
            failed: vec![
                "init vpss failed".to_string(),
                "init middleware failed".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready { marker: String },
    Failed { marker: String },
    Pending,
}

/// Case sensitive, first match wins. The two marker sets are disjoint so the
/// order between them never decides anything.
pub fn classify(chunk: &str, markers: &Markers) -> Readiness {
    if let Some(marker) = markers.ready.iter().find(|m| chunk.contains(m.as_str())) {
        return Readiness::Ready {
            marker: marker.clone(),
        };
    }
    if let Some(marker) = markers.failed.iter().find(|m| chunk.contains(m.as_str())) {
        return Readiness::Failed {
            marker: marker.clone(),
        };
    }
    Readiness::Pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_marker() {
        let readiness = classify(
            "Initialize RTSP\nrtsp://192.168.42.1/h264\n",
            &Markers::default(),
        );

        assert_eq!(
            readiness,
            Readiness::Ready {
                marker: "rtsp://".to_string()
            }
        );
    }

    #[test]
    fn test_failure_markers() {
        let markers = Markers::default();

        assert_eq!(
            classify("[E] init vpss failed: -1\n", &markers),
            Readiness::Failed {
                marker: "init vpss failed".to_string()
            }
        );
        assert_eq!(
            classify("init middleware failed", &markers),
            Readiness::Failed {
                marker: "init middleware failed".to_string()
            }
        );
    }

    #[test]
    fn test_pending_on_unrelated_output() {
        let markers = Markers::default();

        assert_eq!(classify("", &markers), Readiness::Pending);
        assert_eq!(classify("sensor probe ok\n", &markers), Readiness::Pending);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let markers = Markers::default();

        assert_eq!(classify("RTSP://board/h264", &markers), Readiness::Pending);
        assert_eq!(classify("Init VPSS Failed", &markers), Readiness::Pending);
    }

    #[test]
    fn test_marker_set_is_data() {
        let markers = Markers {
            ready: vec!["Initialize RTSP".to_string()],
            failed: vec!["sensor not found".to_string()],
        };

        assert!(matches!(
            classify("Initialize RTSP done", &markers),
            Readiness::Ready { .. }
        ));
        assert_eq!(classify("rtsp://x", &markers), Readiness::Pending);
    }
}

use crate::cluster::{Cluster, Configuration, IdentificationMethod, SourceType};

pub(crate) trait BuiltIn {
    fn built_in() -> Self;
}

fn biowulf() -> Cluster {
    ////////////////////////////////////////////////////////////////////////////////////////
    // NIH Biowulf
    Cluster {
        name: "biowulf".into(),
        identify: IdentificationMethod::ClusterName("biowulf".into()),
        source: SourceType::BiowulfTools,
        submit_marker: None,
        no_accounting_marker: None,
        timeout: None,
    }
}

fn fnlcr() -> Cluster {
    ////////////////////////////////////////////////////////////////////////////////////////
    // Frederick National Laboratory FRCE
    Cluster {
        name: "fnlcr".into(),
        identify: IdentificationMethod::ClusterName("fnlcr".into()),
        source: SourceType::Sacct,
        submit_marker: None,
        no_accounting_marker: None,
        timeout: None,
    }
}

fn none() -> Cluster {
    // Fallback: any Slurm cluster with accounting enabled.
    Cluster {
        name: "none".into(),
        identify: IdentificationMethod::Always(true),
        source: SourceType::Sacct,
        submit_marker: None,
        no_accounting_marker: None,
        timeout: None,
    }
}

impl BuiltIn for Configuration {
    fn built_in() -> Self {
        let cluster = vec![biowulf(), fnlcr(), none()];

        Configuration { cluster }
    }
}

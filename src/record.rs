use serde::{Serialize, Serializer};
use std::fmt;

use crate::accounting::Accounting;
use crate::format;
use crate::scan::JobReference;
use crate::NOT_ACCOUNTABLE;

/// When the scheduler accepted a job.
///
/// The variant order defines the report order: timestamps first (ascending),
/// then submit values that are not numeric, then jobs without accounting.
///
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubmitTime {
    /// Seconds since the epoch.
    Epoch(i64),

    /// A submit value that is not a timestamp, kept verbatim.
    Unparsed(String),

    /// The job has no accounting data.
    NotAccountable,
}

/// One row of the accounting report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobAccountingRecord {
    pub submit_time: SubmitTime,
    pub human_submit_time: String,

    pub job_id: JobReference,
    pub state: String,
    pub job_name: String,

    pub node: String,

    pub queued: String,
    pub elapsed: String,
    pub time_limit: String,

    pub avg_cpus: String,
    pub max_cpu_used: String,
    pub cpus: String,

    pub avg_mem: String,
    pub max_mem_used: String,
    pub mem: String,

    pub partition: String,
    pub qos: String,

    pub username: String,
    pub group: String,
    pub account: String,

    pub work_dir: String,
    pub std_out: String,
    pub std_err: String,
}

impl SubmitTime {
    /// Interpret a raw `submit_time` accounting value.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        value
            .parse()
            .map_or_else(|_| SubmitTime::Unparsed(value.to_string()), SubmitTime::Epoch)
    }
}

impl fmt::Display for SubmitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTime::Epoch(epoch) => write!(f, "{epoch}"),
            SubmitTime::Unparsed(value) => f.write_str(value),
            SubmitTime::NotAccountable => f.write_str(NOT_ACCOUNTABLE),
        }
    }
}

impl Serialize for SubmitTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SubmitTime::Epoch(epoch) => serializer.serialize_i64(*epoch),
            SubmitTime::Unparsed(value) => serializer.serialize_str(value),
            SubmitTime::NotAccountable => serializer.serialize_str(NOT_ACCOUNTABLE),
        }
    }
}

impl JobAccountingRecord {
    /// A record for a job without accounting data.
    ///
    /// Only the submit time (the sentinel) and the job id are set.
    ///
    pub fn not_accountable(job: JobReference) -> Self {
        Self {
            submit_time: SubmitTime::NotAccountable,
            human_submit_time: String::new(),
            job_id: job,
            state: String::new(),
            job_name: String::new(),
            node: String::new(),
            queued: String::new(),
            elapsed: String::new(),
            time_limit: String::new(),
            avg_cpus: String::new(),
            max_cpu_used: String::new(),
            cpus: String::new(),
            avg_mem: String::new(),
            max_mem_used: String::new(),
            mem: String::new(),
            partition: String::new(),
            qos: String::new(),
            username: String::new(),
            group: String::new(),
            account: String::new(),
            work_dir: String::new(),
            std_out: String::new(),
            std_err: String::new(),
        }
    }

    pub fn is_accountable(&self) -> bool {
        self.submit_time != SubmitTime::NotAccountable
    }

    /// The report columns of this record.
    ///
    /// Composite columns join their parts with `:`.
    ///
    pub fn columns(&self) -> [String; 12] {
        [
            self.submit_time.to_string(),
            self.human_submit_time.clone(),
            format!("{}:{}:{}", self.job_id, self.state, self.job_name),
            self.node.clone(),
            format!("{}:{}:{}", self.queued, self.elapsed, self.time_limit),
            format!("{}:{}:{}", self.avg_cpus, self.max_cpu_used, self.cpus),
            format!("{}:{}:{}", self.avg_mem, self.max_mem_used, self.mem),
            format!("{}:{}", self.partition, self.qos),
            format!("{}:{}:{}", self.username, self.group, self.account),
            self.work_dir.clone(),
            self.std_out.clone(),
            self.std_err.clone(),
        ]
    }
}

impl From<&Accounting> for JobAccountingRecord {
    fn from(accounting: &Accounting) -> Self {
        let job = accounting.job();
        let Accounting::Accountable { fields, .. } = accounting else {
            return Self::not_accountable(job.clone());
        };

        let submit_time = SubmitTime::parse(fields.get("submit_time"));
        let human_submit_time = match submit_time {
            SubmitTime::Epoch(epoch) => format::human_submit_time(epoch).unwrap_or_default(),
            _ => String::new(),
        };

        let field = |key: &str| fields.get(key).to_string();

        Self {
            submit_time,
            human_submit_time,
            job_id: job.clone(),
            state: field("state"),
            job_name: field("job_name"),
            node: field("node_list"),
            queued: field("queued"),
            elapsed: field("elapsed"),
            time_limit: field("time_limit"),
            avg_cpus: field("avg_cpus"),
            max_cpu_used: field("max_cpu_used"),
            cpus: field("cpus"),
            avg_mem: field("avg_mem"),
            max_mem_used: field("max_mem_used"),
            mem: field("mem"),
            partition: field("partition"),
            qos: field("qos"),
            username: field("username"),
            group: field("groupname"),
            account: field("account"),
            work_dir: field("work_dir"),
            std_out: field("std_out"),
            std_err: field("std_err"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::parallel;

    use super::*;
    use crate::accounting::RawAccounting;

    fn accountable(id: &str, fields: &[(&str, &str)]) -> Accounting {
        Accounting::Accountable {
            job: JobReference::new(id),
            fields: fields.iter().copied().collect::<RawAccounting>(),
        }
    }

    #[test]
    #[parallel]
    fn not_accountable() {
        let record = JobAccountingRecord::from(&Accounting::NotAccountable {
            job: JobReference::new("1001"),
            reason: "purged".into(),
        });

        assert!(!record.is_accountable());
        let columns = record.columns();
        assert_eq!(columns[0], "JOBNOTACCOUNTABLE");
        assert_eq!(columns[1], "");
        assert_eq!(columns[2], "1001::");
        assert_eq!(columns[3], "");
        assert_eq!(columns[4], "::");
        assert_eq!(columns[7], ":");
        assert_eq!(columns[11], "");
    }

    #[test]
    #[parallel]
    fn missing_fields() {
        let record = JobAccountingRecord::from(&accountable(
            "1002",
            &[("submit_time", "1700000000"), ("state", "COMPLETED")],
        ));

        assert!(record.is_accountable());
        assert_eq!(record.submit_time, SubmitTime::Epoch(1_700_000_000));
        assert!(!record.human_submit_time.is_empty());
        assert!(!record.human_submit_time.contains(' '));

        let columns = record.columns();
        assert_eq!(columns[0], "1700000000");
        assert_eq!(columns[2], "1002:COMPLETED:");
        assert_eq!(columns[5], "::");
        assert_eq!(columns[8], "::");
    }

    #[test]
    #[parallel]
    fn all_fields() {
        let record = JobAccountingRecord::from(&accountable(
            "77",
            &[
                ("submit_time", "1700000050"),
                ("jobid", "77"),
                ("state", "FAILED"),
                ("job_name", "align"),
                ("node_list", "cn0001"),
                ("queued", "00:01:02"),
                ("elapsed", "01:00:00"),
                ("time_limit", "02:00:00"),
                ("avg_cpus", "1.5"),
                ("max_cpu_used", "2"),
                ("cpus", "4"),
                ("avg_mem", "1GB"),
                ("max_mem_used", "2GB"),
                ("mem", "8GB"),
                ("partition", "norm"),
                ("qos", "global"),
                ("username", "user"),
                ("groupname", "group"),
                ("account", "lab"),
                ("work_dir", "/data/run"),
                ("std_out", "/data/run/out"),
                ("std_err", "/data/run/err"),
            ],
        ));

        assert_eq!(
            record.columns()[2..].to_vec(),
            vec![
                "77:FAILED:align",
                "cn0001",
                "00:01:02:01:00:00:02:00:00",
                "1.5:2:4",
                "1GB:2GB:8GB",
                "norm:global",
                "user:group:lab",
                "/data/run",
                "/data/run/out",
                "/data/run/err",
            ]
        );
    }

    #[test]
    #[parallel]
    fn unparsed_submit_time() {
        let record = JobAccountingRecord::from(&accountable("5", &[("state", "PENDING")]));
        assert_eq!(record.submit_time, SubmitTime::Unparsed(String::new()));
        assert_eq!(record.human_submit_time, "");

        let record =
            JobAccountingRecord::from(&accountable("6", &[("submit_time", "Unknown")]));
        assert_eq!(record.submit_time, SubmitTime::Unparsed("Unknown".into()));
        assert_eq!(record.columns()[0], "Unknown");
    }

    #[test]
    #[parallel]
    fn submit_time_order() {
        let mut times = vec![
            SubmitTime::NotAccountable,
            SubmitTime::Unparsed("Unknown".into()),
            SubmitTime::Epoch(1_700_000_100),
            SubmitTime::Epoch(1_700_000_050),
        ];
        times.sort();
        assert_eq!(
            times,
            vec![
                SubmitTime::Epoch(1_700_000_050),
                SubmitTime::Epoch(1_700_000_100),
                SubmitTime::Unparsed("Unknown".into()),
                SubmitTime::NotAccountable,
            ]
        );
    }

    #[test]
    #[parallel]
    fn deterministic() {
        let accounting = accountable("9", &[("submit_time", "1700000000"), ("qos", "gpu")]);
        assert_eq!(
            JobAccountingRecord::from(&accounting),
            JobAccountingRecord::from(&accounting)
        );
    }
}

use crate::constants::{CONTAINER_METRIC_PREFIX, COUNTER_EVENT_PREFIX, VALUE_METRIC_PREFIX};
use crate::envelope::{ContainerMetric, CounterEvent, ValueMetric};
use crate::record::{Dataset, TranslatedRecord};

// example:
// applicationId:"abcd1234-abcd-1234-abcd-12345678abcd" instanceIndex:0 cpuPercentage:0.2489 memoryBytes:356458496 diskBytes:146571264 memoryBytesQuota:536870912 diskBytesQuota:1073741824
pub fn container_metric(cm: &ContainerMetric, record: &mut TranslatedRecord) {
    let p = CONTAINER_METRIC_PREFIX;
    record.dataset = Some(Dataset::Metrics);
    record.add_opt(format!("{p}ApplicationId"), cm.application_id.as_deref());
    record.add_opt(format!("{p}InstanceIndex"), cm.instance_index);
    record.add_opt(format!("{p}CpuPercentage"), cm.cpu_percentage);
    record.add_opt(format!("{p}MemoryBytes"), cm.memory_bytes);
    record.add_opt(format!("{p}DiskBytes"), cm.disk_bytes);
    record.add_opt(format!("{p}MemoryBytesQuota"), cm.memory_bytes_quota);
    record.add_opt(format!("{p}DiskBytesQuota"), cm.disk_bytes_quota);
}

// example:
// name:"dropsondeListener.receivedMessageCount" delta:12 total:90210
pub fn counter_event(ce: &CounterEvent, record: &mut TranslatedRecord) {
    let p = COUNTER_EVENT_PREFIX;
    record.dataset = Some(Dataset::Metrics);
    record.add_opt(format!("{p}Name"), ce.name.as_deref());
    record.add_opt(format!("{p}Delta"), ce.delta);
    record.add_opt(format!("{p}Total"), ce.total);
}

// example:
// name:"total_tcp_routes" value:0 unit:"gauge"
pub fn value_metric(vm: &ValueMetric, record: &mut TranslatedRecord) {
    let p = VALUE_METRIC_PREFIX;
    record.dataset = Some(Dataset::Metrics);
    record.add_opt(format!("{p}Name"), vm.name.as_deref());
    record.add_opt(format!("{p}Value"), vm.value);
    record.add_opt(format!("{p}Unit"), vm.unit.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn field_names(record: &TranslatedRecord) -> Vec<&str> {
        record.fields.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_container_metric_field_set() {
        let cm = ContainerMetric {
            application_id: Some("abcd1234-abcd-1234-abcd-12345678abcd".into()),
            instance_index: Some(0),
            cpu_percentage: Some(0.2489),
            memory_bytes: Some(356_458_496),
            disk_bytes: Some(146_571_264),
            memory_bytes_quota: Some(536_870_912),
            disk_bytes_quota: Some(1_073_741_824),
        };
        let mut record = TranslatedRecord::new();
        container_metric(&cm, &mut record);

        assert_eq!(
            field_names(&record),
            vec![
                "cmApplicationId",
                "cmCpuPercentage",
                "cmDiskBytes",
                "cmDiskBytesQuota",
                "cmInstanceIndex",
                "cmMemoryBytes",
                "cmMemoryBytesQuota",
            ]
        );
        assert_eq!(record.get("cmCpuPercentage"), Some(&FieldValue::Float(0.2489)));
        assert_eq!(record.dataset, Some(Dataset::Metrics));
    }

    #[test]
    fn test_counter_event_field_set() {
        let ce = CounterEvent {
            name: Some("dropsondeListener.receivedMessageCount".into()),
            delta: Some(12),
            total: Some(90_210),
        };
        let mut record = TranslatedRecord::new();
        counter_event(&ce, &mut record);

        assert_eq!(field_names(&record), vec!["ceDelta", "ceName", "ceTotal"]);
        assert_eq!(record.get("ceTotal"), Some(&FieldValue::UInt(90_210)));
    }

    #[test]
    fn test_value_metric_field_set() {
        let vm = ValueMetric {
            name: Some("total_tcp_routes".into()),
            value: Some(0.0),
            unit: Some("gauge".into()),
        };
        let mut record = TranslatedRecord::new();
        value_metric(&vm, &mut record);

        assert_eq!(
            field_names(&record),
            vec!["valuemName", "valuemUnit", "valuemValue"]
        );
    }

    #[test]
    fn test_absent_metric_attributes_are_omitted() {
        let vm = ValueMetric {
            name: Some("latency".into()),
            ..Default::default()
        };
        let mut record = TranslatedRecord::new();
        value_metric(&vm, &mut record);
        assert_eq!(field_names(&record), vec!["valuemName"]);

        let mut record = TranslatedRecord::new();
        container_metric(&ContainerMetric::default(), &mut record);
        assert!(record.is_empty());
    }
}

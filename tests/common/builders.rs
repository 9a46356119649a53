//! Builders for recordings used across tests

use netdemo_rs::{BuildInfo, DemoConfig, DemoDriver, ObjectId, ReplayStorage};

use super::mock_helpers::SourceHandle;

#[derive(Debug, Clone)]
enum Step {
    Frame(Vec<u8>),
    Checkpoint,
    External(ObjectId, Vec<u8>),
    ObjectState(ObjectId, Vec<u8>),
    Event(String, Vec<u8>),
}

/// Records a scripted session through a real [`DemoDriver`]
pub struct RecordingBuilder {
    name: String,
    scene: String,
    config: DemoConfig,
    build: BuildInfo,
    objects: Vec<(ObjectId, Vec<u8>)>,
    steps: Vec<(f64, Step)>,
    end_at: Option<f64>,
    finalize: bool,
}

impl RecordingBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scene: "arena".to_string(),
            config: DemoConfig {
                enable_checkpoints: false,
                ..DemoConfig::default()
            },
            build: BuildInfo::default(),
            objects: Vec::new(),
            steps: Vec::new(),
            end_at: None,
            finalize: true,
        }
    }

    pub fn config(mut self, config: DemoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    /// Spawn an object before recording starts
    pub fn object(mut self, id: u32, state: &[u8]) -> Self {
        self.objects.push((ObjectId(id), state.to_vec()));
        self
    }

    pub fn frame_at(mut self, time: f64, payload: &[u8]) -> Self {
        self.steps.push((time, Step::Frame(payload.to_vec())));
        self
    }

    /// Take a checkpoint on the tick at `time`, after that tick's frames
    pub fn checkpoint_at(mut self, time: f64) -> Self {
        self.steps.push((time, Step::Checkpoint));
        self
    }

    pub fn external_at(mut self, time: f64, key: u32, payload: &[u8]) -> Self {
        self.steps
            .push((time, Step::External(ObjectId(key), payload.to_vec())));
        self
    }

    /// Change an object's saved state from `time` on
    pub fn object_state_at(mut self, time: f64, id: u32, state: &[u8]) -> Self {
        self.steps
            .push((time, Step::ObjectState(ObjectId(id), state.to_vec())));
        self
    }

    pub fn event_at(mut self, time: f64, group: &str, payload: &[u8]) -> Self {
        self.steps
            .push((time, Step::Event(group.to_string(), payload.to_vec())));
        self
    }

    /// Keep recording until `time` before stopping
    pub fn end_at(mut self, time: f64) -> Self {
        self.end_at = Some(time);
        self
    }

    /// Leave the recording without a metadata footer
    pub fn live(mut self) -> Self {
        self.finalize = false;
        self
    }

    /// Record into `storage`
    pub fn record(self, storage: impl ReplayStorage + 'static) {
        let handle = SourceHandle::new();
        let mut driver = DemoDriver::new(self.config, storage).with_build_info(self.build);
        for (id, state) in &self.objects {
            driver.object_spawned(*id);
            handle.set_object_state(*id, state);
        }
        driver
            .start_recording(&self.name, &self.scene, handle.source())
            .unwrap();

        let mut steps = self.steps;
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut index = 0;
        while index < steps.len() {
            let time = steps[index].0;
            let mut events = Vec::new();
            while index < steps.len() && steps[index].0 == time {
                match &steps[index].1 {
                    Step::Frame(payload) => handle.send(payload),
                    Step::Checkpoint => driver.request_checkpoint().unwrap(),
                    Step::External(key, payload) => {
                        driver.record_external_data(*key, payload.clone()).unwrap()
                    }
                    Step::ObjectState(id, state) => handle.set_object_state(*id, state),
                    Step::Event(group, payload) => events.push((group.clone(), payload.clone())),
                }
                index += 1;
            }
            driver.tick(time - driver.current_time()).unwrap();
            for (group, payload) in events {
                driver.add_side_channel_event(&group, "", &payload).unwrap();
            }
        }

        if let Some(end) = self.end_at {
            driver.tick(end - driver.current_time()).unwrap();
        }
        if self.finalize {
            driver.stop().unwrap();
        }
    }
}

/// Frames A at 0.0, B at 0.5 and C at 1.2 with a checkpoint at 0.5
pub fn three_frame_recording(name: &str) -> RecordingBuilder {
    RecordingBuilder::new(name)
        .object(1, b"spawned")
        .frame_at(0.0, b"A")
        .frame_at(0.5, b"B")
        .object_state_at(0.5, 1, b"after-B")
        .checkpoint_at(0.5)
        .frame_at(1.2, b"C")
}

/// A frame every half second for ten seconds, checkpoints at 4 and 7
pub fn ten_second_recording(name: &str) -> RecordingBuilder {
    let mut builder = RecordingBuilder::new(name).object(1, b"t0").object(2, b"t0");
    for step in 0..=20 {
        let time = step as f64 * 0.5;
        builder = builder
            .frame_at(time, format!("f{}", step).as_bytes())
            .object_state_at(time, 1, format!("s{}", step).as_bytes());
    }
    builder.checkpoint_at(4.0).checkpoint_at(7.0)
}

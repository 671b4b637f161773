//! Unit tests for the software device

#[cfg(test)]
mod tests {
    use crate::config::DeviceConfig;
    use crate::device::{
        Device, FloatProperty, IntProperty, SoftDevice, Vec3, Vec3Property, VoiceState,
    };
    use crate::error::{DeviceError, Error};
    use crate::metadata::ChannelFormat;
    use approx::assert_relative_eq;

    fn mono_device(rate: u32) -> SoftDevice {
        SoftDevice::open(DeviceConfig {
            sample_rate: rate,
            channels: 1,
            ..Default::default()
        })
        .unwrap()
    }

    /// Creates a voice with one buffer per chunk queued on it
    fn voice_with(device: &SoftDevice, chunks: &[&[i16]], rate: u32) -> (u32, Vec<u32>) {
        let voice = device.create_voice().unwrap();
        let mut ids = Vec::new();
        for chunk in chunks {
            let id = device.create_buffer().unwrap();
            device
                .upload(id, ChannelFormat::Mono16, chunk, rate)
                .unwrap();
            ids.push(id);
        }
        device.queue_buffers(voice, &ids).unwrap();
        (voice, ids)
    }

    #[test]
    fn test_open_validates_config() {
        let bad_rate = SoftDevice::open(DeviceConfig {
            sample_rate: 0,
            ..Default::default()
        });
        assert!(matches!(bad_rate, Err(Error::DeviceFailure(_))));

        let bad_channels = SoftDevice::open(DeviceConfig {
            channels: 6,
            ..Default::default()
        });
        assert!(matches!(bad_channels, Err(Error::DeviceFailure(_))));

        let no_voices = SoftDevice::open(DeviceConfig {
            max_voices: 0,
            ..Default::default()
        });
        assert!(matches!(no_voices, Err(Error::ContextFailure(_))));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let device = mono_device(8000);
        assert!(device.claim().is_ok());
        assert_eq!(device.claim(), Err(DeviceError::InvalidOperation));

        device.unclaim();
        assert!(device.claim().is_ok());
    }

    #[test]
    fn test_voice_and_buffer_limits() {
        let device = SoftDevice::open(DeviceConfig {
            max_voices: 1,
            max_buffers: 2,
            ..Default::default()
        })
        .unwrap();

        let voice = device.create_voice().unwrap();
        assert_eq!(device.create_voice(), Err(DeviceError::OutOfMemory));

        device.create_buffer().unwrap();
        device.create_buffer().unwrap();
        assert_eq!(device.create_buffer(), Err(DeviceError::OutOfMemory));

        device.delete_voice(voice).unwrap();
        assert!(device.create_voice().is_ok());
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let device = mono_device(8000);
        assert_eq!(device.play(42), Err(DeviceError::InvalidName));
        assert_eq!(device.delete_buffer(42), Err(DeviceError::InvalidName));

        let voice = device.create_voice().unwrap();
        assert_eq!(
            device.queue_buffers(voice, &[42]),
            Err(DeviceError::InvalidName)
        );
    }

    #[test]
    fn test_render_consumes_and_processes_buffers() {
        let device = mono_device(1000);
        let (voice, ids) = voice_with(&device, &[&[100; 10], &[200; 10], &[300; 10]], 1000);

        device.play(voice).unwrap();
        assert_eq!(device.voice_state(voice), Ok(VoiceState::Playing));
        assert_eq!(device.buffers_processed(voice), Ok(0));

        let out = device.render(10);
        assert_eq!(out, vec![100; 10]);
        assert_eq!(device.buffers_processed(voice), Ok(1));
        assert_eq!(device.buffers_queued(voice), Ok(3));

        assert_eq!(device.unqueue_processed(voice), Ok(ids[0]));
        assert_eq!(device.buffers_processed(voice), Ok(0));
        assert_eq!(device.buffers_queued(voice), Ok(2));

        let out = device.render(25);
        assert_eq!(&out[..10], &[200; 10]);
        assert_eq!(&out[10..20], &[300; 10]);
        assert_eq!(&out[20..], &[0; 5]);
        assert_eq!(device.voice_state(voice), Ok(VoiceState::Stopped));
    }

    #[test]
    fn test_stopped_voice_reports_everything_processed() {
        let device = mono_device(1000);
        let (voice, _) = voice_with(&device, &[&[1; 4], &[2; 4]], 1000);

        device.play(voice).unwrap();
        device.stop(voice).unwrap();

        assert_eq!(device.buffers_processed(voice), Ok(2));
        device.unqueue_processed(voice).unwrap();
        device.unqueue_processed(voice).unwrap();
        assert_eq!(device.buffers_queued(voice), Ok(0));
        assert_eq!(
            device.unqueue_processed(voice),
            Err(DeviceError::InvalidValue)
        );
    }

    #[test]
    fn test_queued_buffers_are_protected() {
        let device = mono_device(1000);
        let (voice, ids) = voice_with(&device, &[&[1; 4]], 1000);

        assert_eq!(
            device.upload(ids[0], ChannelFormat::Mono16, &[0; 4], 1000),
            Err(DeviceError::InvalidOperation)
        );
        assert_eq!(
            device.delete_buffer(ids[0]),
            Err(DeviceError::InvalidOperation)
        );

        device.play(voice).unwrap();
        assert_eq!(
            device.set_int(voice, IntProperty::Buffer, 0),
            Err(DeviceError::InvalidOperation)
        );

        device.stop(voice).unwrap();
        device.set_int(voice, IntProperty::Buffer, 0).unwrap();
        assert_eq!(device.buffers_queued(voice), Ok(0));
        device.delete_buffer(ids[0]).unwrap();
    }

    #[test]
    fn test_pause_keeps_position() {
        let device = mono_device(1000);
        let samples: Vec<i16> = (0..20).collect();
        let (voice, _) = voice_with(&device, &[&samples], 1000);

        device.play(voice).unwrap();
        device.render(5);
        device.pause(voice).unwrap();
        assert_eq!(device.render(5), vec![0; 5]);

        device.play(voice).unwrap();
        assert_eq!(device.render(3), vec![5, 6, 7]);
    }

    #[test]
    fn test_play_from_stopped_restarts_queue() {
        let device = mono_device(1000);
        let samples: Vec<i16> = (1..=8).collect();
        let (voice, _) = voice_with(&device, &[&samples], 1000);

        device.play(voice).unwrap();
        device.render(4);
        device.stop(voice).unwrap();
        device.play(voice).unwrap();
        assert_eq!(device.render(2), vec![1, 2]);
    }

    #[test]
    fn test_play_with_empty_queue_stops() {
        let device = mono_device(1000);
        let voice = device.create_voice().unwrap();
        device.play(voice).unwrap();
        assert_eq!(device.voice_state(voice), Ok(VoiceState::Stopped));
    }

    #[test]
    fn test_looping_voice_wraps() {
        let device = mono_device(1000);
        let (voice, _) = voice_with(&device, &[&[7, 8, 9]], 1000);

        device.set_int(voice, IntProperty::Looping, 1).unwrap();
        device.play(voice).unwrap();
        assert_eq!(device.render(7), vec![7, 8, 9, 7, 8, 9, 7]);
        assert_eq!(device.voice_state(voice), Ok(VoiceState::Playing));
    }

    #[test]
    fn test_gain_scales_and_mix_saturates() {
        let device = mono_device(1000);
        let (first, _) = voice_with(&device, &[&[1000; 4]], 1000);
        device.set_float(first, FloatProperty::Gain, 0.5).unwrap();
        device.play(first).unwrap();
        assert_eq!(device.render(2), vec![500, 500]);

        let (second, _) = voice_with(&device, &[&[i16::MAX; 4]], 1000);
        let (third, _) = voice_with(&device, &[&[i16::MAX; 4]], 1000);
        device.play(second).unwrap();
        device.play(third).unwrap();
        assert_eq!(device.render(2), vec![i16::MAX, i16::MAX]);
    }

    #[test]
    fn test_stereo_output_and_mono_downmix() {
        let stereo = SoftDevice::open(DeviceConfig {
            sample_rate: 1000,
            channels: 2,
            ..Default::default()
        })
        .unwrap();
        let voice = stereo.create_voice().unwrap();
        let buffer = stereo.create_buffer().unwrap();
        stereo
            .upload(buffer, ChannelFormat::Stereo16, &[100, -100, 300, 500], 1000)
            .unwrap();
        stereo.queue_buffers(voice, &[buffer]).unwrap();
        stereo.play(voice).unwrap();
        assert_eq!(stereo.render(2), vec![100, -100, 300, 500]);

        let mono = mono_device(1000);
        let voice = mono.create_voice().unwrap();
        let buffer = mono.create_buffer().unwrap();
        mono.upload(buffer, ChannelFormat::Stereo16, &[100, 300], 1000)
            .unwrap();
        mono.queue_buffers(voice, &[buffer]).unwrap();
        mono.play(voice).unwrap();
        assert_eq!(mono.render(1), vec![200]);
    }

    #[test]
    fn test_buffer_rate_and_pitch_set_consumption_speed() {
        let device = mono_device(1000);
        let samples: Vec<i16> = (0..40).collect();
        let (voice, _) = voice_with(&device, &[&samples], 2000);

        device.play(voice).unwrap();
        assert_eq!(device.render(3), vec![0, 2, 4]);

        device.set_float(voice, FloatProperty::Pitch, 0.5).unwrap();
        assert_eq!(device.render(3), vec![6, 7, 8]);
    }

    #[test]
    fn test_sec_offset_tracks_cursor() {
        let device = mono_device(1000);
        let (voice, _) = voice_with(&device, &[&[0; 500], &[0; 500]], 1000);

        assert_relative_eq!(
            device.get_float(voice, FloatProperty::SecOffset).unwrap(),
            0.0
        );

        device.play(voice).unwrap();
        device.render(250);
        assert_relative_eq!(
            device.get_float(voice, FloatProperty::SecOffset).unwrap(),
            0.25
        );

        // Offset is relative to the buffer being played
        device.render(350);
        assert_relative_eq!(
            device.get_float(voice, FloatProperty::SecOffset).unwrap(),
            0.1
        );

        assert_eq!(
            device.set_float(voice, FloatProperty::SecOffset, 1.0),
            Err(DeviceError::InvalidOperation)
        );
    }

    #[test]
    fn test_property_validation() {
        let device = mono_device(1000);
        let voice = device.create_voice().unwrap();

        assert_eq!(
            device.set_float(voice, FloatProperty::Gain, -0.1),
            Err(DeviceError::InvalidValue)
        );
        assert_eq!(
            device.set_float(voice, FloatProperty::Pitch, 0.0),
            Err(DeviceError::InvalidValue)
        );
        assert_eq!(
            device.set_int(voice, IntProperty::Buffer, 99),
            Err(DeviceError::InvalidValue)
        );

        device.set_float(voice, FloatProperty::Gain, 0.0).unwrap();
        assert_relative_eq!(device.get_float(voice, FloatProperty::Gain).unwrap(), 0.0);
        device
            .set_float(voice, FloatProperty::MaxDistance, 25.0)
            .unwrap();
        assert_relative_eq!(
            device
                .get_float(voice, FloatProperty::MaxDistance)
                .unwrap(),
            25.0
        );
    }

    #[test]
    fn test_vec3_properties() {
        let device = mono_device(1000);
        let voice = device.create_voice().unwrap();

        assert_eq!(
            device.get_vec3(voice, Vec3Property::Position),
            Ok(Vec3::default())
        );

        let position = Vec3::new(1.0, -2.0, 0.5);
        device
            .set_vec3(voice, Vec3Property::Position, position)
            .unwrap();
        device
            .set_vec3(voice, Vec3Property::Velocity, Vec3::new(0.0, 0.0, 3.0))
            .unwrap();

        assert_eq!(device.get_vec3(voice, Vec3Property::Position), Ok(position));
        assert_eq!(
            device.get_vec3(voice, Vec3Property::Velocity),
            Ok(Vec3::new(0.0, 0.0, 3.0))
        );
    }

    #[test]
    fn test_static_buffer_binding() {
        let device = mono_device(1000);
        let voice = device.create_voice().unwrap();
        let buffer = device.create_buffer().unwrap();
        device
            .upload(buffer, ChannelFormat::Mono16, &[5, 6], 1000)
            .unwrap();

        device
            .set_int(voice, IntProperty::Buffer, buffer as i32)
            .unwrap();
        assert_eq!(device.get_int(voice, IntProperty::Buffer), Ok(buffer as i32));
        assert_eq!(device.buffers_queued(voice), Ok(1));

        device.play(voice).unwrap();
        assert_eq!(device.render(3), vec![5, 6, 0]);
    }
}
